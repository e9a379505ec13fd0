//! HTTP surface over the contract engine

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::audit::AuditQuery;
use crate::engine::{allowed_commands, Command};
use crate::error::Result;
use crate::models::{
    Actor, AuditEntry, CancelRequest, ChangeRoleRequest, Contract, ContractVersion,
    CreateContractRequest, CreateUserRequest, CreateWorkflowRequest, ForwardRemarksRequest,
    Rejection, Role, RoleChange, TermsPatch, User, WorkflowDefinition,
};
use crate::permissions::Capability;
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users", post(create_user))
        .route("/users/:id/role", post(change_role))
        .route("/users/:id/roles", get(role_history))
        .route("/workflows", get(list_workflows).post(create_workflow))
        .route("/workflows/active", get(active_workflow))
        .route("/workflows/versions/:version", get(workflow_by_version))
        .route(
            "/workflows/:id",
            get(get_workflow).put(rename_workflow).delete(delete_workflow),
        )
        .route("/contracts", post(create_contract))
        .route("/contracts/:id", get(get_contract))
        .route("/contracts/:id/versions", get(list_versions))
        .route("/contracts/:id/versions/:number", get(get_version))
        .route("/contracts/:id/workflow", get(contract_workflow))
        .route("/contracts/:id/draft", patch(edit_draft))
        .route("/contracts/:id/submit", post(submit))
        .route("/contracts/:id/approve", post(approve))
        .route("/contracts/:id/reject", post(reject))
        .route("/contracts/:id/amend", post(amend))
        .route("/contracts/:id/cancel", post(cancel))
        .route("/contracts/:id/remarks/client", post(send_remarks_to_client))
        .route("/audit", get(audit_trail))
        .route("/permissions/:role", get(role_permissions))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// A contract together with its current version and what can happen next
#[derive(Debug, Serialize)]
pub struct ContractView {
    pub contract: Contract,
    pub current_version: ContractVersion,
    pub allowed_commands: Vec<Command>,
}

impl ContractView {
    fn new(contract: Contract, current_version: ContractVersion) -> Self {
        Self {
            allowed_commands: allowed_commands(current_version.status),
            contract,
            current_version,
        }
    }
}

#[derive(Debug, Serialize)]
struct PermissionsView {
    role: Role,
    capabilities: BTreeMap<&'static str, bool>,
}

#[derive(Debug, Deserialize)]
struct RenameWorkflowRequest {
    name: String,
}

// Users

async fn create_user(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state.engine.register_user(&actor, &req.name, req.role).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn change_role(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<Json<User>> {
    let user = state.engine.change_role(&actor, id, req.role).await?;
    Ok(Json(user))
}

async fn role_history(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RoleChange>>> {
    Ok(Json(state.engine.role_history(&actor, id).await?))
}

// Workflows

async fn active_workflow(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
) -> Result<Json<WorkflowDefinition>> {
    Ok(Json(state.engine.workflows().get_active().await?))
}

async fn list_workflows(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
) -> Result<Json<Vec<WorkflowDefinition>>> {
    Ok(Json(state.engine.workflows().list().await?))
}

async fn create_workflow(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<WorkflowDefinition>)> {
    let definition = state
        .engine
        .create_workflow_version(&actor, &req.name, req.steps)
        .await?;
    Ok((StatusCode::CREATED, Json(definition)))
}

async fn workflow_by_version(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(version): Path<i64>,
) -> Result<Json<WorkflowDefinition>> {
    Ok(Json(state.engine.workflows().get_by_version(version).await?))
}

async fn get_workflow(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowDefinition>> {
    Ok(Json(state.engine.workflows().get(id).await?))
}

async fn rename_workflow(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameWorkflowRequest>,
) -> Result<StatusCode> {
    state
        .engine
        .permissions()
        .require(&actor, Capability::ManageWorkflows)?;
    state.engine.workflows().rename(id, &req.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_workflow(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state
        .engine
        .permissions()
        .require(&actor, Capability::ManageWorkflows)?;
    state.engine.workflows().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Contracts

async fn create_contract(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<CreateContractRequest>,
) -> Result<(StatusCode, Json<ContractView>)> {
    let (contract, version) = state
        .engine
        .create_contract(&actor, req.client_id, req.terms)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ContractView::new(contract, version.visible_to(actor.role))),
    ))
}

async fn get_contract(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ContractView>> {
    let contract = state.engine.get_contract(id, &actor).await?;
    let version = state.engine.current_version(id, &actor).await?;
    Ok(Json(ContractView::new(contract, version)))
}

async fn list_versions(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ContractVersion>>> {
    Ok(Json(state.engine.versions(id, &actor).await?))
}

async fn get_version(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((id, number)): Path<(Uuid, i64)>,
) -> Result<Json<ContractVersion>> {
    Ok(Json(state.engine.version(id, number, &actor).await?))
}

async fn contract_workflow(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowDefinition>> {
    state.engine.get_contract(id, &actor).await?;
    Ok(Json(state.engine.locked_workflow(id).await?))
}

async fn edit_draft(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(patch): Json<TermsPatch>,
) -> Result<Json<ContractVersion>> {
    let version = state.engine.edit_draft(id, &actor, patch).await?;
    Ok(Json(version.visible_to(actor.role)))
}

async fn submit(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ContractVersion>> {
    let version = state.engine.submit(id, &actor).await?;
    Ok(Json(version.visible_to(actor.role)))
}

async fn approve(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ContractVersion>> {
    let version = state.engine.approve(id, &actor).await?;
    Ok(Json(version.visible_to(actor.role)))
}

async fn reject(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(rejection): Json<Rejection>,
) -> Result<Json<ContractVersion>> {
    let version = state.engine.reject(id, &actor, rejection).await?;
    Ok(Json(version.visible_to(actor.role)))
}

async fn amend(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(patch): Json<TermsPatch>,
) -> Result<(StatusCode, Json<ContractVersion>)> {
    let version = state.engine.amend(id, &actor, patch).await?;
    Ok((StatusCode::CREATED, Json(version.visible_to(actor.role))))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<ContractVersion>> {
    let version = state.engine.cancel(id, &actor, req.reason).await?;
    Ok(Json(version.visible_to(actor.role)))
}

async fn send_remarks_to_client(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<ForwardRemarksRequest>,
) -> Result<StatusCode> {
    state
        .engine
        .send_remarks_to_client(id, &actor, req.remarks_client)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// Audit and permissions

async fn audit_trail(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>> {
    Ok(Json(state.engine.audit_trail(&actor, &query).await?))
}

async fn role_permissions(
    State(state): State<Arc<AppState>>,
    Path(role): Path<Role>,
) -> Json<PermissionsView> {
    let capabilities = state.engine.permissions().capabilities(role).as_map();
    Json(PermissionsView { role, capabilities })
}
