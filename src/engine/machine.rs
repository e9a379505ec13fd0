//! Contract status transition table
//!
//! Pure lookup of which command may move a version from which status. Guards
//! that need the actor or the contract live in the engine.

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::ContractStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    EditDraft,
    Submit,
    Approve,
    Reject,
    /// Produces a new draft version; the rejected one stays rejected
    Amend,
    Cancel,
    SendRemarksToClient,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::EditDraft => "edit_draft",
            Command::Submit => "submit",
            Command::Approve => "approve",
            Command::Reject => "reject",
            Command::Amend => "amend",
            Command::Cancel => "cancel",
            Command::SendRemarksToClient => "send_remarks_to_client",
        }
    }

    pub fn all() -> [Command; 7] {
        [
            Command::EditDraft,
            Command::Submit,
            Command::Approve,
            Command::Reject,
            Command::Amend,
            Command::Cancel,
            Command::SendRemarksToClient,
        ]
    }
}

fn target(from: ContractStatus, command: Command) -> Option<ContractStatus> {
    use Command::*;
    use ContractStatus::*;

    match (from, command) {
        (Draft, EditDraft) => Some(Draft),
        (Draft, Submit) => Some(PendingFinance),
        (PendingFinance, Approve) => Some(PendingClient),
        (PendingFinance, Reject) => Some(Rejected),
        (PendingClient, Approve) => Some(Active),
        (PendingClient, Reject) => Some(Rejected),
        (Rejected, Amend) => Some(Draft),
        (PendingClient | Rejected, Cancel) => Some(Cancelled),
        (Rejected, SendRemarksToClient) => Some(Rejected),
        _ => None,
    }
}

/// Status `command` leads to from `from`, or `InvalidState`
pub fn next_status(from: ContractStatus, command: Command) -> Result<ContractStatus> {
    target(from, command).ok_or_else(|| {
        AppError::InvalidState(format!(
            "Cannot {} a contract version in status {}",
            command.as_str(),
            from
        ))
    })
}

/// Commands the table permits from `from`, ignoring actor guards
pub fn allowed_commands(from: ContractStatus) -> Vec<Command> {
    Command::all()
        .into_iter()
        .filter(|c| target(from, *c).is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ContractStatus::*;

    #[test]
    fn test_happy_path() {
        assert_eq!(next_status(Draft, Command::Submit).unwrap(), PendingFinance);
        assert_eq!(
            next_status(PendingFinance, Command::Approve).unwrap(),
            PendingClient
        );
        assert_eq!(next_status(PendingClient, Command::Approve).unwrap(), Active);
    }

    #[test]
    fn test_rejection_paths() {
        assert_eq!(next_status(PendingFinance, Command::Reject).unwrap(), Rejected);
        assert_eq!(next_status(PendingClient, Command::Reject).unwrap(), Rejected);
        assert_eq!(next_status(Rejected, Command::Amend).unwrap(), Draft);
        assert_eq!(
            next_status(Rejected, Command::SendRemarksToClient).unwrap(),
            Rejected
        );
    }

    #[test]
    fn test_cancel_sources() {
        assert_eq!(next_status(PendingClient, Command::Cancel).unwrap(), Cancelled);
        assert_eq!(next_status(Rejected, Command::Cancel).unwrap(), Cancelled);
        assert!(next_status(Draft, Command::Cancel).is_err());
        assert!(next_status(PendingFinance, Command::Cancel).is_err());
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for status in [Active, Cancelled] {
            assert!(status.is_terminal());
            assert!(allowed_commands(status).is_empty());
            for command in Command::all() {
                let err = next_status(status, command).unwrap_err();
                assert!(matches!(err, AppError::InvalidState(_)));
            }
        }
    }

    #[test]
    fn test_amend_only_from_rejected() {
        for status in [Draft, PendingFinance, PendingClient, Active, Cancelled] {
            assert!(next_status(status, Command::Amend).is_err());
        }
    }

    #[test]
    fn test_allowed_commands() {
        assert_eq!(
            allowed_commands(Draft),
            vec![Command::EditDraft, Command::Submit]
        );
        assert_eq!(
            allowed_commands(PendingClient),
            vec![Command::Approve, Command::Reject, Command::Cancel]
        );
        assert_eq!(
            allowed_commands(Rejected),
            vec![Command::Amend, Command::Cancel, Command::SendRemarksToClient]
        );
    }

    #[test]
    fn test_every_edge_moves_along_graph() {
        let edges: Vec<(ContractStatus, ContractStatus)> = [
            Draft,
            PendingFinance,
            PendingClient,
            Active,
            Rejected,
            Cancelled,
        ]
        .into_iter()
        .flat_map(|from| {
            allowed_commands(from)
                .into_iter()
                .map(move |c| (from, next_status(from, c).unwrap()))
        })
        .collect();

        assert!(!edges.contains(&(Draft, PendingClient)));
        assert!(!edges.contains(&(Draft, Active)));
        assert!(!edges.contains(&(Rejected, PendingFinance)));
        assert!(edges.iter().all(|(from, _)| !from.is_terminal()));
    }
}
