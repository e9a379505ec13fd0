//! Permission oracle
//!
//! Maps a validated [`Role`] to the set of capabilities it grants. The engine
//! consults the oracle before every mutating command.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{AppError, Result};
use crate::models::{Actor, Role};

/// Capabilities that can be granted to a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CreateContract,
    EditContract,
    SubmitContract,
    AmendContract,
    /// Forward withheld finance remarks to the client
    ForwardRemarks,
    FinanceReview,
    ClientReview,
    CancelContract,
    ViewAudit,
    ManageWorkflows,
    ManageUsers,
    /// Full administrative access (includes all other capabilities)
    Admin,
}

impl Capability {
    /// Wire name, as used in permission maps and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CreateContract => "create_contract",
            Capability::EditContract => "edit_contract",
            Capability::SubmitContract => "submit_contract",
            Capability::AmendContract => "amend_contract",
            Capability::ForwardRemarks => "forward_remarks",
            Capability::FinanceReview => "finance_review",
            Capability::ClientReview => "client_review",
            Capability::CancelContract => "cancel_contract",
            Capability::ViewAudit => "view_audit",
            Capability::ManageWorkflows => "manage_workflows",
            Capability::ManageUsers => "manage_users",
            Capability::Admin => "admin",
        }
    }

    /// Every capability, in declaration order
    pub fn all() -> [Capability; 12] {
        [
            Capability::CreateContract,
            Capability::EditContract,
            Capability::SubmitContract,
            Capability::AmendContract,
            Capability::ForwardRemarks,
            Capability::FinanceReview,
            Capability::ClientReview,
            Capability::CancelContract,
            Capability::ViewAudit,
            Capability::ManageWorkflows,
            Capability::ManageUsers,
            Capability::Admin,
        ]
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Capability::all()
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Invalid capability: {}", s))
    }
}

/// A set of capabilities with helper methods
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    capabilities: HashSet<Capability>,
}

impl CapabilitySet {
    /// Check if this set contains a capability (respects Admin override)
    pub fn has(&self, cap: Capability) -> bool {
        self.capabilities.contains(&Capability::Admin) || self.capabilities.contains(&cap)
    }

    /// Every known capability name mapped to whether this set grants it
    pub fn as_map(&self) -> BTreeMap<&'static str, bool> {
        Capability::all()
            .into_iter()
            .map(|c| (c.as_str(), self.has(c)))
            .collect()
    }
}

impl From<Vec<Capability>> for CapabilitySet {
    fn from(capabilities: Vec<Capability>) -> Self {
        Self {
            capabilities: capabilities.into_iter().collect(),
        }
    }
}

/// Source of role capabilities
pub trait PermissionOracle: Send + Sync {
    fn capabilities(&self, role: Role) -> CapabilitySet;

    /// Fail with `Unauthorized` unless `actor`'s role grants `cap`
    fn require(&self, actor: &Actor, cap: Capability) -> Result<()> {
        if self.capabilities(actor.role).has(cap) {
            Ok(())
        } else {
            Err(AppError::Unauthorized(format!(
                "Role {} lacks capability: {}",
                actor.role,
                cap.as_str()
            )))
        }
    }
}

/// Fixed capability table keyed by role
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionTable;

impl PermissionOracle for StaticPermissionTable {
    fn capabilities(&self, role: Role) -> CapabilitySet {
        use Capability::*;
        let caps = match role {
            Role::Admin => vec![Admin],
            Role::Legal => vec![
                CreateContract,
                EditContract,
                SubmitContract,
                AmendContract,
                ForwardRemarks,
                ViewAudit,
            ],
            Role::Finance | Role::SeniorFinance => vec![FinanceReview, ViewAudit],
            Role::Client => vec![ClientReview, CancelContract],
        };
        caps.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_capability_from_str() {
        assert_eq!(
            "finance_review".parse::<Capability>().unwrap(),
            Capability::FinanceReview
        );
        assert!("fly".parse::<Capability>().is_err());
    }

    #[test]
    fn test_admin_override() {
        let caps = StaticPermissionTable.capabilities(Role::Admin);
        for cap in Capability::all() {
            assert!(caps.has(cap), "admin should have {}", cap.as_str());
        }
    }

    #[test]
    fn test_legal_capabilities() {
        let caps = StaticPermissionTable.capabilities(Role::Legal);
        assert!(caps.has(Capability::CreateContract));
        assert!(caps.has(Capability::ForwardRemarks));
        assert!(!caps.has(Capability::FinanceReview));
        assert!(!caps.has(Capability::CancelContract));
    }

    #[test]
    fn test_finance_roles_share_review() {
        for role in [Role::Finance, Role::SeniorFinance] {
            let caps = StaticPermissionTable.capabilities(role);
            assert!(caps.has(Capability::FinanceReview));
            assert!(!caps.has(Capability::CreateContract));
        }
    }

    #[test]
    fn test_client_capabilities() {
        let caps = StaticPermissionTable.capabilities(Role::Client);
        assert!(caps.has(Capability::ClientReview));
        assert!(caps.has(Capability::CancelContract));
        assert!(!caps.has(Capability::ViewAudit));
    }

    #[test]
    fn test_as_map_lists_every_capability() {
        let map = StaticPermissionTable.capabilities(Role::Client).as_map();
        assert_eq!(map.len(), Capability::all().len());
        assert_eq!(map["client_review"], true);
        assert_eq!(map["admin"], false);
    }

    #[test]
    fn test_require() {
        let client = Actor::new(Uuid::new_v4(), Role::Client);
        assert!(StaticPermissionTable
            .require(&client, Capability::ClientReview)
            .is_ok());
        let err = StaticPermissionTable
            .require(&client, Capability::FinanceReview)
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
