//! Data models for contracts, versions, workflow definitions and audit entries

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Organisational role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    /// Drafting role
    Legal,
    Finance,
    SeniorFinance,
    /// External counterparty
    Client,
}

impl Role {
    /// Token stored in the database and used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Legal => "legal",
            Role::Finance => "finance",
            Role::SeniorFinance => "senior_finance",
            Role::Client => "client",
        }
    }

    /// Every role, in declaration order
    pub fn all() -> [Role; 5] {
        [
            Role::Admin,
            Role::Legal,
            Role::Finance,
            Role::SeniorFinance,
            Role::Client,
        ]
    }

    /// Whether this role may act on a step that requires `required`.
    /// Senior finance covers every finance step.
    pub fn satisfies(&self, required: Role) -> bool {
        *self == required || (*self == Role::SeniorFinance && required == Role::Finance)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "legal" => Ok(Role::Legal),
            "finance" => Ok(Role::Finance),
            "senior_finance" => Ok(Role::SeniorFinance),
            "client" => Ok(Role::Client),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approval status of a contract version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    PendingFinance,
    PendingClient,
    Active,
    Rejected,
    Cancelled,
}

impl ContractStatus {
    /// Token stored in the database and used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::PendingFinance => "pending_finance",
            ContractStatus::PendingClient => "pending_client",
            ContractStatus::Active => "active",
            ContractStatus::Rejected => "rejected",
            ContractStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContractStatus::Active | ContractStatus::Cancelled)
    }
}

impl std::str::FromStr for ContractStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ContractStatus::Draft),
            "pending_finance" => Ok(ContractStatus::PendingFinance),
            "pending_client" => Ok(ContractStatus::PendingClient),
            "active" => Ok(ContractStatus::Active),
            "rejected" => Ok(ContractStatus::Rejected),
            "cancelled" => Ok(ContractStatus::Cancelled),
            _ => Err(format!("Invalid contract status: {}", s)),
        }
    }
}

impl std::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of action a workflow step performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Submit,
    Approve,
    Review,
    FinalApprove,
}

impl StepAction {
    /// Token stored in `workflow_steps.action`
    pub fn as_str(&self) -> &'static str {
        match self {
            StepAction::Submit => "submit",
            StepAction::Approve => "approve",
            StepAction::Review => "review",
            StepAction::FinalApprove => "final_approve",
        }
    }
}

impl std::str::FromStr for StepAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submit" => Ok(StepAction::Submit),
            "approve" => Ok(StepAction::Approve),
            "review" => Ok(StepAction::Review),
            "final_approve" => Ok(StepAction::FinalApprove),
            _ => Err(format!("Invalid step action: {}", s)),
        }
    }
}

/// Action recorded in the audit ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    Submitted,
    Approved,
    Rejected,
    Amended,
    Cancelled,
}

impl AuditAction {
    /// Token stored in `audit_entries.action`
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Updated => "updated",
            AuditAction::Submitted => "submitted",
            AuditAction::Approved => "approved",
            AuditAction::Rejected => "rejected",
            AuditAction::Amended => "amended",
            AuditAction::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(AuditAction::Created),
            "updated" => Ok(AuditAction::Updated),
            "submitted" => Ok(AuditAction::Submitted),
            "approved" => Ok(AuditAction::Approved),
            "rejected" => Ok(AuditAction::Rejected),
            "amended" => Ok(AuditAction::Amended),
            "cancelled" => Ok(AuditAction::Cancelled),
            _ => Err(format!("Invalid audit action: {}", s)),
        }
    }
}

/// The authenticated caller of an engine command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

/// A registered user with their current role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The user acting under their current role
    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }
}

/// One entry in a user's append-only role history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleChange {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Negotiable terms of a contract version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terms {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterpart_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,
    /// Amount in minor currency units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
}

impl Terms {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counterpart_email: None,
            effective_date: None,
            amount: None,
        }
    }

    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_counterpart_email(mut self, email: impl Into<String>) -> Self {
        self.counterpart_email = Some(email.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Contract name is required".to_string());
        }
        if let Some(email) = &self.counterpart_email {
            let well_formed = email
                .split_once('@')
                .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
                .unwrap_or(false);
            if !well_formed {
                return Err(format!("Invalid counterpart email: {}", email));
            }
        }
        if matches!(self.amount, Some(a) if a < 0) {
            return Err("Amount must not be negative".to_string());
        }
        Ok(())
    }
}

/// Partial update of the mutable term fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub counterpart_email: Option<String>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    #[serde(default)]
    pub amount: Option<i64>,
}

impl TermsPatch {
    pub fn amount(amount: i64) -> Self {
        Self {
            amount: Some(amount),
            ..Default::default()
        }
    }

    /// True when the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.counterpart_email.is_none()
            && self.effective_date.is_none()
            && self.amount.is_none()
    }

    /// Overlay this patch on `base`, returning the merged terms
    pub fn apply_to(&self, base: &Terms) -> Terms {
        Terms {
            name: self.name.clone().unwrap_or_else(|| base.name.clone()),
            counterpart_email: self
                .counterpart_email
                .clone()
                .or_else(|| base.counterpart_email.clone()),
            effective_date: self.effective_date.or(base.effective_date),
            amount: self.amount.or(base.amount),
        }
    }
}

/// Top-level contract aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub client_id: Uuid,
    pub creator_id: Uuid,
    /// Locked at creation, never changes
    pub workflow_definition_id: Uuid,
    pub workflow_version: i64,
    pub current_version: i64,
    pub current_step: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    pub fn is_creator(&self, actor: &Actor) -> bool {
        self.creator_id == actor.id
    }

    pub fn is_client(&self, actor: &Actor) -> bool {
        self.client_id == actor.id
    }
}

/// One versioned snapshot of a contract's terms and its approval status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractVersion {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub version_number: i64,
    #[serde(flatten)]
    pub terms: Terms,
    pub status: ContractStatus,
    pub is_current: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by_finance: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finance_approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by_client: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    /// Finance remarks for legal/finance/admin only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks_internal: Option<String>,
    /// Finance remarks addressed to the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks_client: Option<String>,
    /// Remark left by the client when rejecting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_remark: Option<String>,
    /// Legacy unified remark, mirrors whichever channel rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_remarks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks_sent_to_client_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContractVersion {
    /// The initial draft created together with its contract
    pub fn first(contract_id: Uuid, terms: Terms) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            contract_id,
            version_number: 1,
            terms,
            status: ContractStatus::Draft,
            is_current: true,
            approved_by_finance: None,
            finance_approved_at: None,
            approved_by_client: None,
            client_approved_at: None,
            rejected_by: None,
            rejected_at: None,
            remarks_internal: None,
            remarks_client: None,
            client_remark: None,
            rejection_remarks: None,
            remarks_sent_to_client_at: None,
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The draft that follows this version, seeded from its terms
    pub fn successor(&self, patch: &TermsPatch) -> Self {
        let mut next = Self::first(self.contract_id, patch.apply_to(&self.terms));
        next.version_number = self.version_number + 1;
        next
    }

    fn expect_status(&self, expected: ContractStatus, what: &str) -> Result<(), String> {
        if self.status != expected {
            return Err(format!(
                "Cannot {} version {} with status: {}",
                what,
                self.version_number,
                self.status.as_str()
            ));
        }
        Ok(())
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    /// Overwrite the mutable term fields of a draft
    pub fn edit_terms(&mut self, patch: &TermsPatch) -> Result<(), String> {
        self.expect_status(ContractStatus::Draft, "edit")?;
        self.terms = patch.apply_to(&self.terms);
        self.touch(Utc::now());
        Ok(())
    }

    pub fn submit(&mut self) -> Result<(), String> {
        self.expect_status(ContractStatus::Draft, "submit")?;
        self.status = ContractStatus::PendingFinance;
        self.touch(Utc::now());
        Ok(())
    }

    pub fn approve_finance(&mut self, approver: Uuid, at: DateTime<Utc>) -> Result<(), String> {
        self.expect_status(ContractStatus::PendingFinance, "finance-approve")?;
        if self.approved_by_finance.is_some() {
            return Err("Finance approval already recorded".to_string());
        }
        self.status = ContractStatus::PendingClient;
        self.approved_by_finance = Some(approver);
        self.finance_approved_at = Some(at);
        self.touch(at);
        Ok(())
    }

    pub fn approve_client(&mut self, approver: Uuid, at: DateTime<Utc>) -> Result<(), String> {
        self.expect_status(ContractStatus::PendingClient, "client-approve")?;
        if self.approved_by_client.is_some() {
            return Err("Client approval already recorded".to_string());
        }
        self.status = ContractStatus::Active;
        self.approved_by_client = Some(approver);
        self.client_approved_at = Some(at);
        self.touch(at);
        Ok(())
    }

    /// Finance rejection: internal remarks are mandatory, client remarks optional
    pub fn reject_finance(
        &mut self,
        rejecter: Uuid,
        remarks_internal: String,
        remarks_client: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), String> {
        self.expect_status(ContractStatus::PendingFinance, "finance-reject")?;
        self.status = ContractStatus::Rejected;
        self.rejected_by = Some(rejecter);
        self.rejected_at = Some(at);
        self.rejection_remarks = Some(remarks_internal.clone());
        self.remarks_internal = Some(remarks_internal);
        self.remarks_client = remarks_client;
        self.touch(at);
        Ok(())
    }

    pub fn reject_client(
        &mut self,
        rejecter: Uuid,
        remark: String,
        at: DateTime<Utc>,
    ) -> Result<(), String> {
        self.expect_status(ContractStatus::PendingClient, "client-reject")?;
        self.status = ContractStatus::Rejected;
        self.rejected_by = Some(rejecter);
        self.rejected_at = Some(at);
        self.rejection_remarks = Some(remark.clone());
        self.client_remark = Some(remark);
        self.touch(at);
        Ok(())
    }

    pub fn cancel(
        &mut self,
        canceller: Uuid,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), String> {
        if !matches!(
            self.status,
            ContractStatus::PendingClient | ContractStatus::Rejected
        ) {
            return Err(format!(
                "Cannot cancel version {} with status: {}",
                self.version_number,
                self.status.as_str()
            ));
        }
        self.status = ContractStatus::Cancelled;
        self.cancelled_by = Some(canceller);
        self.cancelled_at = Some(at);
        self.cancellation_reason = reason;
        self.touch(at);
        Ok(())
    }

    /// Whether the rejection came from finance rather than the client
    pub fn rejected_by_finance(&self) -> bool {
        self.status == ContractStatus::Rejected
            && self.remarks_internal.is_some()
            && self.client_remark.is_none()
    }

    /// Record client-facing remarks curated by the drafting role
    pub fn forward_client_remarks(
        &mut self,
        remarks: String,
        at: DateTime<Utc>,
    ) -> Result<(), String> {
        self.expect_status(ContractStatus::Rejected, "forward remarks for")?;
        if !self.rejected_by_finance() {
            return Err("Only finance rejections carry remarks to forward".to_string());
        }
        if self.remarks_sent_to_client_at.is_some() {
            return Err("Remarks were already sent to the client".to_string());
        }
        self.remarks_client = Some(remarks);
        self.remarks_sent_to_client_at = Some(at);
        self.touch(at);
        Ok(())
    }

    /// Copy of this version with remark channels filtered for `role`
    pub fn visible_to(&self, role: Role) -> Self {
        let mut view = self.clone();
        if role == Role::Client {
            view.remarks_internal = None;
            view.rejection_remarks = view
                .client_remark
                .clone()
                .or_else(|| view.remarks_client.clone());
        }
        view
    }
}

/// One stage of a workflow definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub order: i64,
    pub name: String,
    pub required_role: Role,
    pub action: StepAction,
    #[serde(default)]
    pub can_skip: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Step {
    pub fn new(order: i64, name: impl Into<String>, required_role: Role, action: StepAction) -> Self {
        Self {
            order,
            name: name.into(),
            required_role,
            action,
            can_skip: false,
            is_active: true,
        }
    }
}

/// A versioned, immutable approval template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: Uuid,
    pub version: i64,
    pub name: String,
    pub steps: Vec<Step>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub const DEFAULT_NAME: &'static str = "Standard contract approval";

    /// Draft-submit, finance approval, client final approval
    pub fn default_steps() -> Vec<Step> {
        vec![
            Step::new(1, "Draft & Submit", Role::Legal, StepAction::Submit),
            Step::new(2, "Finance Approval", Role::Finance, StepAction::Approve),
            Step::new(3, "Client Approval", Role::Client, StepAction::FinalApprove),
        ]
    }

    /// Reject step lists the fixed status graph cannot run on
    pub fn validate_steps(steps: &[Step]) -> Result<(), String> {
        if steps.is_empty() {
            return Err("Workflow definition needs at least one step".to_string());
        }
        for (idx, step) in steps.iter().enumerate() {
            if step.order != idx as i64 + 1 {
                return Err(format!(
                    "Step orders must be contiguous from 1, found {} at position {}",
                    step.order,
                    idx + 1
                ));
            }
            if step.name.trim().is_empty() {
                return Err(format!("Step {} has no name", step.order));
            }
        }

        let active = |pred: fn(StepAction) -> bool| {
            steps
                .iter()
                .filter(|s| s.is_active && pred(s.action))
                .count()
        };
        if active(|a| a == StepAction::Submit) != 1 {
            return Err("Exactly one active submit step is required".to_string());
        }
        if active(|a| matches!(a, StepAction::Approve | StepAction::Review)) == 0 {
            return Err("At least one active approve or review step is required".to_string());
        }
        if active(|a| a == StepAction::FinalApprove) != 1 {
            return Err("Exactly one active final_approve step is required".to_string());
        }
        Ok(())
    }

    /// The step a version in `status` is waiting on, if any
    pub fn awaiting_step(&self, status: ContractStatus) -> Option<&Step> {
        let wanted: fn(StepAction) -> bool = match status {
            ContractStatus::Draft => |a| a == StepAction::Submit,
            ContractStatus::PendingFinance => {
                |a| matches!(a, StepAction::Approve | StepAction::Review)
            }
            ContractStatus::PendingClient => |a| a == StepAction::FinalApprove,
            _ => return None,
        };
        self.steps.iter().find(|s| s.is_active && wanted(s.action))
    }

    /// Step pointer for a contract whose current version is in `status`
    pub fn step_pointer(&self, status: ContractStatus) -> i64 {
        match self.awaiting_step(status) {
            Some(step) => step.order,
            None if status == ContractStatus::Rejected => self
                .awaiting_step(ContractStatus::Draft)
                .map(|s| s.order)
                .unwrap_or(1),
            None => self.steps.last().map(|s| s.order).unwrap_or(1),
        }
    }
}

/// An immutable audit ledger record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub contract_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<Uuid>,
    pub action: AuditAction,
    pub actor_id: Uuid,
    /// Role the actor held when the entry was written
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Request to create a new contract
#[derive(Debug, Deserialize)]
pub struct CreateContractRequest {
    pub client_id: Uuid,
    #[serde(flatten)]
    pub terms: Terms,
}

/// Remarks accompanying a rejection. `remarks` is the single-channel form
/// used by clients and by legacy callers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rejection {
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub remarks_internal: Option<String>,
    #[serde(default)]
    pub remarks_client: Option<String>,
}

fn non_blank(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl Rejection {
    pub fn remarks(remarks: impl Into<String>) -> Self {
        Self {
            remarks: Some(remarks.into()),
            ..Default::default()
        }
    }

    pub fn split(internal: impl Into<String>, client: Option<String>) -> Self {
        Self {
            remarks: None,
            remarks_internal: Some(internal.into()),
            remarks_client: client,
        }
    }

    /// Internal channel, falling back to the unified field
    pub fn internal_text(&self) -> Option<String> {
        non_blank(&self.remarks_internal).or_else(|| non_blank(&self.remarks))
    }

    /// Client-facing channel, if given and not blank
    pub fn client_text(&self) -> Option<String> {
        non_blank(&self.remarks_client)
    }

    /// Single channel for client rejections
    pub fn single_text(&self) -> Option<String> {
        non_blank(&self.remarks).or_else(|| non_blank(&self.remarks_client))
    }
}

/// Request to cancel a contract
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request to forward finance remarks to the client
#[derive(Debug, Deserialize)]
pub struct ForwardRemarksRequest {
    pub remarks_client: String,
}

/// Request to create a new workflow definition version
#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub name: String,
    pub steps: Vec<Step>,
}

/// Request to register a user
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub role: Role,
}

/// Request to change a user's role
#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}
