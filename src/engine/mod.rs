//! Contract workflow engine
//!
//! Every command follows the same shape:
//! - load the contract, its current version and its **locked** workflow
//!   definition
//! - check the transition table, capabilities and ownership guards
//! - apply the mutation to an in-memory copy of the version
//! - commit the conditional version write and exactly one audit entry in a
//!   single transaction
//! - notify interested parties, best effort, after the commit

pub mod machine;

use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::{AuditLedger, AuditQuery, NewAuditEntry};
use crate::directory::Directory;
use crate::error::{AppError, Result};
use crate::models::{
    Actor, AuditAction, AuditEntry, Contract, ContractStatus, ContractVersion, Rejection, Role,
    RoleChange, Step, Terms, TermsPatch, User, WorkflowDefinition,
};
use crate::notify::{Notification, NotificationDispatcher, NotificationKind};
use crate::permissions::{Capability, PermissionOracle};
use crate::store::Store;
use crate::workflow::WorkflowStore;

pub use machine::{allowed_commands, next_status, Command};

/// A contract with its current version and the definition it is locked to
struct Loaded {
    contract: Contract,
    version: ContractVersion,
    definition: WorkflowDefinition,
}

pub struct ContractEngine {
    store: Store,
    workflows: WorkflowStore,
    ledger: AuditLedger,
    directory: Directory,
    permissions: Arc<dyn PermissionOracle>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl ContractEngine {
    pub fn new(
        pool: SqlitePool,
        permissions: Arc<dyn PermissionOracle>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            store: Store::new(pool.clone()),
            workflows: WorkflowStore::new(pool.clone()),
            ledger: AuditLedger::new(pool.clone()),
            directory: Directory::new(pool),
            permissions,
            notifier,
        }
    }

    /// Contract and version persistence
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Workflow definitions, including the active one
    pub fn workflows(&self) -> &WorkflowStore {
        &self.workflows
    }

    /// The append-only audit ledger
    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    /// Users and their role history
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// The oracle every guard consults
    pub fn permissions(&self) -> &dyn PermissionOracle {
        self.permissions.as_ref()
    }

    // Contract commands

    /// Create a contract and its version-1 draft, locking the active workflow
    pub async fn create_contract(
        &self,
        actor: &Actor,
        client_id: Uuid,
        terms: Terms,
    ) -> Result<(Contract, ContractVersion)> {
        self.permissions.require(actor, Capability::CreateContract)?;
        terms.validate().map_err(AppError::Validation)?;

        let client = match self.directory.get(client_id).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::Validation(format!("Client {} does not exist", client_id)))
            }
            Err(e) => return Err(e),
        };
        if client.role != Role::Client {
            return Err(AppError::Validation(format!(
                "User {} is not a client",
                client_id
            )));
        }

        let definition = self.workflows.get_active().await?;
        require_step_role(&definition, ContractStatus::Draft, actor)?;

        let now = Utc::now();
        let contract = Contract {
            id: Uuid::new_v4(),
            client_id,
            creator_id: actor.id,
            workflow_definition_id: definition.id,
            workflow_version: definition.version,
            current_version: 1,
            current_step: definition.step_pointer(ContractStatus::Draft),
            created_at: now,
            updated_at: now,
        };
        let version = ContractVersion::first(contract.id, terms);

        let mut tx = self.store.begin().await?;
        self.store.insert_contract(&mut tx, &contract).await?;
        self.store.insert_version(&mut tx, &version).await?;
        self.ledger
            .append_in(
                &mut tx,
                NewAuditEntry::new(contract.id, AuditAction::Created, actor)
                    .version(version.id)
                    .metadata(json!({
                        "version": 1,
                        "workflow_definition_id": definition.id,
                        "workflow_version": definition.version,
                    })),
            )
            .await?;
        tx.commit().await?;

        tracing::info!(
            contract_id = %contract.id,
            workflow_version = definition.version,
            "Created contract"
        );
        Ok((contract, version))
    }

    /// Overwrite term fields of the current draft
    pub async fn edit_draft(
        &self,
        contract_id: Uuid,
        actor: &Actor,
        patch: TermsPatch,
    ) -> Result<ContractVersion> {
        let loaded = self.load(contract_id).await?;
        next_status(loaded.version.status, Command::EditDraft)?;
        self.permissions.require(actor, Capability::EditContract)?;
        require_creator(&loaded.contract, actor, "edit the draft")?;
        if patch.is_empty() {
            return Err(AppError::Validation("No term changes given".to_string()));
        }

        let mut updated = loaded.version.clone();
        updated.edit_terms(&patch).map_err(AppError::InvalidState)?;
        updated.terms.validate().map_err(AppError::Validation)?;

        let changes = serde_json::to_value(&patch)
            .map_err(|e| AppError::Internal(format!("Failed to encode changes: {}", e)))?;
        self.commit_transition(
            &loaded,
            ContractStatus::Draft,
            &updated,
            NewAuditEntry::new(contract_id, AuditAction::Updated, actor)
                .version(updated.id)
                .metadata(json!({ "changes": changes })),
        )
        .await?;

        Ok(updated)
    }

    /// Hand the current draft to finance
    pub async fn submit(&self, contract_id: Uuid, actor: &Actor) -> Result<ContractVersion> {
        let loaded = self.load(contract_id).await?;
        next_status(loaded.version.status, Command::Submit)?;
        self.permissions.require(actor, Capability::SubmitContract)?;
        require_creator(&loaded.contract, actor, "submit")?;
        require_step_role(&loaded.definition, ContractStatus::Draft, actor)?;

        let mut updated = loaded.version.clone();
        updated.submit().map_err(AppError::InvalidState)?;

        self.commit_transition(
            &loaded,
            ContractStatus::Draft,
            &updated,
            NewAuditEntry::new(contract_id, AuditAction::Submitted, actor).version(updated.id),
        )
        .await?;

        let reviewers = self
            .lookup_recipients(&[Role::Finance, Role::SeniorFinance])
            .await;
        self.dispatch(
            reviewers,
            actor,
            NotificationKind::ContractSubmitted,
            "Contract awaiting finance review",
            format!(
                "{} (version {}) was submitted for finance review",
                updated.terms.name, updated.version_number
            ),
            contract_id,
        );

        Ok(updated)
    }

    /// Finance approval from `pending_finance`, client approval from `pending_client`
    pub async fn approve(&self, contract_id: Uuid, actor: &Actor) -> Result<ContractVersion> {
        let loaded = self.load(contract_id).await?;
        let from = loaded.version.status;
        next_status(from, Command::Approve)?;
        self.require_review_stage(&loaded, actor)?;

        let now = Utc::now();
        let mut updated = loaded.version.clone();

        match from {
            ContractStatus::PendingFinance => {
                self.require_finance_reviewer(&loaded, actor)?;
                updated
                    .approve_finance(actor.id, now)
                    .map_err(AppError::InvalidState)?;
            }
            _ => {
                self.require_client_reviewer(&loaded, actor)?;
                updated
                    .approve_client(actor.id, now)
                    .map_err(AppError::InvalidState)?;
            }
        }

        let stage = stage_name(from);
        self.commit_transition(
            &loaded,
            from,
            &updated,
            NewAuditEntry::new(contract_id, AuditAction::Approved, actor)
                .version(updated.id)
                .metadata(json!({ "stage": stage })),
        )
        .await?;

        if from == ContractStatus::PendingFinance {
            self.dispatch(
                [loaded.contract.client_id, loaded.contract.creator_id],
                actor,
                NotificationKind::FinanceApproved,
                "Contract approved by finance",
                format!(
                    "{} (version {}) is awaiting client approval",
                    updated.terms.name, updated.version_number
                ),
                contract_id,
            );
        } else {
            self.dispatch(
                [loaded.contract.creator_id],
                actor,
                NotificationKind::ContractActivated,
                "Contract is active",
                format!(
                    "{} (version {}) was approved by the client",
                    updated.terms.name, updated.version_number
                ),
                contract_id,
            );
        }

        Ok(updated)
    }

    /// Reject the pending version. Finance must give internal remarks; the
    /// client must give a single remark.
    pub async fn reject(
        &self,
        contract_id: Uuid,
        actor: &Actor,
        rejection: Rejection,
    ) -> Result<ContractVersion> {
        let loaded = self.load(contract_id).await?;
        let from = loaded.version.status;
        next_status(from, Command::Reject)?;
        self.require_review_stage(&loaded, actor)?;

        let now = Utc::now();
        let mut updated = loaded.version.clone();

        let (remarks, metadata) = match from {
            ContractStatus::PendingFinance => {
                self.require_finance_reviewer(&loaded, actor)?;
                let internal = rejection.internal_text().ok_or_else(|| {
                    AppError::Validation("remarks_internal is required".to_string())
                })?;
                let client = rejection.client_text();
                let metadata = json!({
                    "stage": stage_name(from),
                    "client_remarks_provided": client.is_some(),
                });
                updated
                    .reject_finance(actor.id, internal.clone(), client, now)
                    .map_err(AppError::InvalidState)?;
                (internal, metadata)
            }
            _ => {
                self.require_client_reviewer(&loaded, actor)?;
                let remark = rejection
                    .single_text()
                    .ok_or_else(|| AppError::Validation("remarks are required".to_string()))?;
                updated
                    .reject_client(actor.id, remark.clone(), now)
                    .map_err(AppError::InvalidState)?;
                (remark, json!({ "stage": stage_name(from) }))
            }
        };

        self.commit_transition(
            &loaded,
            from,
            &updated,
            NewAuditEntry::new(contract_id, AuditAction::Rejected, actor)
                .version(updated.id)
                .remarks(Some(remarks))
                .metadata(metadata),
        )
        .await?;

        self.dispatch(
            [loaded.contract.creator_id],
            actor,
            NotificationKind::ContractRejected,
            "Contract rejected",
            format!(
                "{} (version {}) was rejected during {} review",
                updated.terms.name,
                updated.version_number,
                stage_name(from)
            ),
            contract_id,
        );

        Ok(updated)
    }

    /// Start version N+1 as a draft seeded from the rejected version N
    pub async fn amend(
        &self,
        contract_id: Uuid,
        actor: &Actor,
        patch: TermsPatch,
    ) -> Result<ContractVersion> {
        let loaded = self.load(contract_id).await?;
        next_status(loaded.version.status, Command::Amend)?;
        self.permissions.require(actor, Capability::AmendContract)?;
        require_creator(&loaded.contract, actor, "amend")?;

        let prior = &loaded.version;
        let next = prior.successor(&patch);
        next.terms.validate().map_err(AppError::Validation)?;

        let changes = serde_json::to_value(&patch)
            .map_err(|e| AppError::Internal(format!("Failed to encode changes: {}", e)))?;

        let mut tx = self.store.begin().await?;
        self.store
            .retire_version(&mut tx, prior.id, ContractStatus::Rejected)
            .await?;
        self.store.insert_version(&mut tx, &next).await?;
        self.store
            .advance_contract(
                &mut tx,
                contract_id,
                loaded.contract.current_version,
                next.version_number,
                loaded.definition.step_pointer(ContractStatus::Draft),
            )
            .await?;
        self.ledger
            .append_in(
                &mut tx,
                NewAuditEntry::new(contract_id, AuditAction::Amended, actor)
                    .version(next.id)
                    .metadata(json!({
                        "from_version": prior.version_number,
                        "to_version": next.version_number,
                        "changes": changes,
                    })),
            )
            .await?;
        tx.commit().await?;

        tracing::info!(
            contract_id = %contract_id,
            version = next.version_number,
            "Amended contract"
        );
        Ok(next)
    }

    /// Cancel from `pending_client` or `rejected`. Only the client or an admin.
    pub async fn cancel(
        &self,
        contract_id: Uuid,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<ContractVersion> {
        let loaded = self.load(contract_id).await?;
        let from = loaded.version.status;
        next_status(from, Command::Cancel)?;

        let caps = self.permissions.capabilities(actor.role);
        if !caps.has(Capability::CancelContract) {
            return Err(AppError::Unauthorized(format!(
                "Role {} lacks capability: {}",
                actor.role,
                Capability::CancelContract.as_str()
            )));
        }
        if !loaded.contract.is_client(actor) && !caps.has(Capability::Admin) {
            return Err(AppError::Unauthorized(
                "Only the contract's client or an admin can cancel".to_string(),
            ));
        }

        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let mut updated = loaded.version.clone();
        updated
            .cancel(actor.id, reason.clone(), Utc::now())
            .map_err(AppError::InvalidState)?;

        self.commit_transition(
            &loaded,
            from,
            &updated,
            NewAuditEntry::new(contract_id, AuditAction::Cancelled, actor)
                .version(updated.id)
                .remarks(reason)
                .metadata(json!({ "from_status": from.as_str() })),
        )
        .await?;

        self.dispatch(
            [loaded.contract.creator_id, loaded.contract.client_id],
            actor,
            NotificationKind::ContractCancelled,
            "Contract cancelled",
            format!(
                "{} (version {}) was cancelled",
                updated.terms.name, updated.version_number
            ),
            contract_id,
        );

        Ok(updated)
    }

    /// Forward finance remarks the client has not seen yet
    pub async fn send_remarks_to_client(
        &self,
        contract_id: Uuid,
        actor: &Actor,
        remarks_client: String,
    ) -> Result<()> {
        let loaded = self.load(contract_id).await?;
        next_status(loaded.version.status, Command::SendRemarksToClient)?;
        self.permissions.require(actor, Capability::ForwardRemarks)?;

        let remarks = remarks_client.trim().to_string();
        if remarks.is_empty() {
            return Err(AppError::Validation("remarks_client is required".to_string()));
        }

        let mut updated = loaded.version.clone();
        updated
            .forward_client_remarks(remarks.clone(), Utc::now())
            .map_err(AppError::InvalidState)?;

        self.commit_transition(
            &loaded,
            ContractStatus::Rejected,
            &updated,
            NewAuditEntry::new(contract_id, AuditAction::Updated, actor)
                .version(updated.id)
                .remarks(Some(remarks))
                .metadata(json!({ "event": "remarks_sent_to_client" })),
        )
        .await?;

        self.dispatch(
            [loaded.contract.client_id],
            actor,
            NotificationKind::RemarksForwarded,
            "Remarks on your contract",
            format!(
                "Finance remarks on {} (version {}) are available",
                updated.terms.name, updated.version_number
            ),
            contract_id,
        );

        Ok(())
    }

    // Reads

    pub async fn get_contract(&self, contract_id: Uuid, actor: &Actor) -> Result<Contract> {
        let contract = self.store.get_contract(contract_id).await?;
        require_reader(&contract, actor)?;
        Ok(contract)
    }

    /// Current version, with remark channels filtered for the actor's role
    pub async fn current_version(
        &self,
        contract_id: Uuid,
        actor: &Actor,
    ) -> Result<ContractVersion> {
        self.get_contract(contract_id, actor).await?;
        let version = self.store.get_current_version(contract_id).await?;
        Ok(version.visible_to(actor.role))
    }

    pub async fn versions(&self, contract_id: Uuid, actor: &Actor) -> Result<Vec<ContractVersion>> {
        self.get_contract(contract_id, actor).await?;
        let versions = self.store.list_versions(contract_id).await?;
        Ok(versions
            .into_iter()
            .map(|v| v.visible_to(actor.role))
            .collect())
    }

    pub async fn version(
        &self,
        contract_id: Uuid,
        version_number: i64,
        actor: &Actor,
    ) -> Result<ContractVersion> {
        self.get_contract(contract_id, actor).await?;
        let version = self.store.get_version(contract_id, version_number).await?;
        Ok(version.visible_to(actor.role))
    }

    /// The definition the contract was locked to at creation
    pub async fn locked_workflow(&self, contract_id: Uuid) -> Result<WorkflowDefinition> {
        let contract = self.store.get_contract(contract_id).await?;
        self.workflows.get(contract.workflow_definition_id).await
    }

    pub async fn audit_trail(&self, actor: &Actor, query: &AuditQuery) -> Result<Vec<AuditEntry>> {
        self.permissions.require(actor, Capability::ViewAudit)?;
        query.validate()?;
        self.ledger.list(query).await
    }

    // Administration

    pub async fn create_workflow_version(
        &self,
        actor: &Actor,
        name: &str,
        steps: Vec<Step>,
    ) -> Result<WorkflowDefinition> {
        self.permissions.require(actor, Capability::ManageWorkflows)?;
        self.workflows.create_version(name, steps, Some(actor.id)).await
    }

    pub async fn register_user(&self, actor: &Actor, name: &str, role: Role) -> Result<User> {
        self.permissions.require(actor, Capability::ManageUsers)?;
        self.directory.register(name, role).await
    }

    pub async fn change_role(&self, actor: &Actor, user_id: Uuid, role: Role) -> Result<User> {
        self.permissions.require(actor, Capability::ManageUsers)?;
        self.directory.change_role(user_id, role, actor.id).await
    }

    pub async fn role_history(&self, actor: &Actor, user_id: Uuid) -> Result<Vec<RoleChange>> {
        if actor.id != user_id {
            self.permissions.require(actor, Capability::ManageUsers)?;
        }
        self.directory.role_history(user_id).await
    }

    // Internals

    async fn load(&self, contract_id: Uuid) -> Result<Loaded> {
        let contract = self.store.get_contract(contract_id).await?;
        let version = self.store.get_current_version(contract_id).await?;
        let definition = self.workflows.get(contract.workflow_definition_id).await?;
        Ok(Loaded {
            contract,
            version,
            definition,
        })
    }

    /// The contract's client reviews `pending_client`, finance reviewers
    /// review `pending_finance`. A reviewer meeting the other stage either
    /// came too early or lost a race to a decision that already committed.
    fn require_review_stage(&self, loaded: &Loaded, actor: &Actor) -> Result<()> {
        let caps = self.permissions.capabilities(actor.role);
        let stage = if loaded.contract.is_client(actor) {
            ContractStatus::PendingClient
        } else if caps.has(Capability::FinanceReview) && !caps.has(Capability::Admin) {
            ContractStatus::PendingFinance
        } else {
            return Ok(());
        };

        if loaded.version.status != stage {
            return Err(AppError::InvalidState(format!(
                "Version {} is {}, not awaiting {} review",
                loaded.version.version_number,
                loaded.version.status,
                stage_name(stage)
            )));
        }
        Ok(())
    }

    fn require_finance_reviewer(&self, loaded: &Loaded, actor: &Actor) -> Result<()> {
        self.permissions.require(actor, Capability::FinanceReview)?;
        require_step_role(&loaded.definition, ContractStatus::PendingFinance, actor)?;
        // Authorship outlives role changes: a former drafter now in finance
        // still may not review their own contract
        if loaded.contract.is_creator(actor) {
            return Err(AppError::ConflictOfInterest(format!(
                "User {} created contract {} and cannot review it",
                actor.id, loaded.contract.id
            )));
        }
        Ok(())
    }

    fn require_client_reviewer(&self, loaded: &Loaded, actor: &Actor) -> Result<()> {
        self.permissions.require(actor, Capability::ClientReview)?;
        if !loaded.contract.is_client(actor) {
            return Err(AppError::Unauthorized(
                "Only the contract's client can review at this stage".to_string(),
            ));
        }
        require_step_role(&loaded.definition, ContractStatus::PendingClient, actor)?;
        Ok(())
    }

    /// Conditional version write, step pointer move and audit append, as one
    /// transaction
    async fn commit_transition(
        &self,
        loaded: &Loaded,
        expected: ContractStatus,
        updated: &ContractVersion,
        entry: NewAuditEntry,
    ) -> Result<AuditEntry> {
        let step = loaded.definition.step_pointer(updated.status);

        let mut tx = self.store.begin().await?;
        self.store.update_version(&mut tx, updated, expected).await?;
        if step != loaded.contract.current_step {
            self.store
                .advance_contract(
                    &mut tx,
                    loaded.contract.id,
                    loaded.contract.current_version,
                    loaded.contract.current_version,
                    step,
                )
                .await?;
        }
        let entry = self.ledger.append_in(&mut tx, entry).await?;
        tx.commit().await?;

        tracing::info!(
            contract_id = %loaded.contract.id,
            version = updated.version_number,
            from = %expected,
            to = %updated.status,
            action = entry.action.as_str(),
            "Committed transition"
        );
        Ok(entry)
    }

    async fn lookup_recipients(&self, roles: &[Role]) -> Vec<Uuid> {
        match self.directory.ids_with_roles(roles).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("Failed to resolve notification recipients: {}", e);
                Vec::new()
            }
        }
    }

    fn dispatch(
        &self,
        recipients: impl IntoIterator<Item = Uuid>,
        actor: &Actor,
        kind: NotificationKind,
        title: &str,
        message: String,
        contract_id: Uuid,
    ) {
        let mut seen = Vec::new();
        for recipient_id in recipients {
            if recipient_id == actor.id || seen.contains(&recipient_id) {
                continue;
            }
            seen.push(recipient_id);
            self.notifier.notify(Notification {
                recipient_id,
                kind,
                title: title.to_string(),
                message: message.clone(),
                contract_id,
            });
        }
    }
}

fn stage_name(status: ContractStatus) -> &'static str {
    match status {
        ContractStatus::PendingFinance => "finance",
        _ => "client",
    }
}

fn require_creator(contract: &Contract, actor: &Actor, what: &str) -> Result<()> {
    if contract.is_creator(actor) {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!(
            "Only the contract's creator can {}",
            what
        )))
    }
}

/// The actor's role must satisfy the locked definition's step for `status`
fn require_step_role<'a>(
    definition: &'a WorkflowDefinition,
    status: ContractStatus,
    actor: &Actor,
) -> Result<&'a Step> {
    let step = definition.awaiting_step(status).ok_or_else(|| {
        AppError::InvalidState(format!(
            "Workflow version {} has no active step for status {}",
            definition.version, status
        ))
    })?;
    if !actor.role.satisfies(step.required_role) {
        return Err(AppError::Unauthorized(format!(
            "Step '{}' requires role {}",
            step.name, step.required_role
        )));
    }
    Ok(step)
}

/// Clients only see their own contracts
fn require_reader(contract: &Contract, actor: &Actor) -> Result<()> {
    if actor.role == Role::Client && !contract.is_client(actor) {
        return Err(AppError::Unauthorized(format!(
            "Contract {} belongs to another client",
            contract.id
        )));
    }
    Ok(())
}
