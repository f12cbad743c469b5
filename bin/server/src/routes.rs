//! HTTP handlers for the workflow API.
//!
//! Every route is scoped to an owner, read from the `x-wallet-address`
//! header by the [`Owner`] extractor.

use crate::app::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::{FromRef, FromRequestParts, Path, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use defi_flow_core::{WorkflowId, WorkflowRunId};
use defi_flow_workflow::{
    Connection, ExecutionState, ExecutionTrail, Module, Workflow, WorkflowGraph, WorkflowSummary,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{info, instrument};

/// Header naming the wallet that owns the request.
pub const WALLET_HEADER: &str = "x-wallet-address";

/// The wallet a request acts for.
///
/// Falls back to the configured default owner when the header is absent or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

impl<S> FromRequestParts<S> for Owner
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let wallet = parts
            .headers
            .get(WALLET_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match wallet {
            Some(wallet) => Ok(Owner(wallet.to_string())),
            None => {
                let app_state = Arc::<AppState>::from_ref(state);
                Ok(Owner(app_state.default_owner.clone()))
            }
        }
    }
}

fn parse_id(raw: &str) -> Result<WorkflowId, ApiError> {
    raw.parse().map_err(|e: defi_flow_core::ParseIdError| ApiError::InvalidId {
        id: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Body for creating a workflow.
#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: WorkflowId,
}

/// A graph posted for execution or validation.
#[derive(Debug, Default, Deserialize)]
pub struct GraphRequest {
    #[serde(default)]
    pub modules: Option<Vec<Module>>,
    #[serde(default)]
    pub connections: Option<Vec<Connection>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub run_id: WorkflowRunId,
    pub state: ExecutionState,
    pub results: ExecutionTrail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub errors: Vec<String>,
}

pub async fn health() -> &'static str {
    "ok"
}

#[instrument(skip(state))]
pub async fn list_workflows(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<Json<Vec<WorkflowSummary>>, ApiError> {
    let workflows = state.store.list(&owner).await?;
    Ok(Json(workflows.iter().map(WorkflowSummary::from).collect()))
}

#[instrument(skip(state, request))]
pub async fn create_workflow(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(request): Json<CreateWorkflowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidRequest {
            details: "name is required".to_string(),
        });
    }

    let mut workflow = Workflow::new(name, request.modules, request.connections);
    workflow.description = request
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    state.store.create(&owner, &workflow).await?;
    info!(workflow_id = %workflow.id, "workflow created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse { id: workflow.id }),
    ))
}

#[instrument(skip(state))]
pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, ApiError> {
    let workflow_id = parse_id(&id)?;
    state
        .store
        .get(&owner, workflow_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound { id })
}

#[instrument(skip(state))]
pub async fn delete_workflow(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let workflow_id = parse_id(&id)?;
    if state.store.delete(&owner, workflow_id).await? {
        info!(workflow_id = %workflow_id, "workflow deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound { id })
    }
}

#[instrument(skip(state))]
pub async fn duplicate_workflow(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let workflow_id = parse_id(&id)?;
    let copy = state
        .store
        .duplicate(&owner, workflow_id)
        .await?
        .ok_or(ApiError::NotFound { id })?;

    info!(workflow_id = %workflow_id, copy_id = %copy.id, "workflow duplicated");
    Ok((StatusCode::CREATED, Json(copy)))
}

/// Runs the posted graph, or the stored one when the body carries no modules.
#[instrument(skip(state, request))]
pub async fn execute_workflow(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    Json(request): Json<GraphRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let workflow_id = parse_id(&id)?;

    let (modules, connections) = match request.modules {
        Some(modules) => (modules, request.connections.unwrap_or_default()),
        None => {
            let stored = state
                .store
                .get(&owner, workflow_id)
                .await?
                .ok_or(ApiError::NotFound { id })?;
            (stored.modules, stored.connections)
        }
    };

    let timeout = state.execution_timeout();
    let run = tokio::time::timeout(timeout, state.engine.run(&modules, &connections))
        .await
        .map_err(|_| ApiError::Timeout { after: timeout })?;

    if let Some(rejection) = run.rejection {
        return Err(rejection.into());
    }

    info!(workflow_id = %workflow_id, run_id = %run.id, state = ?run.state, "workflow executed");
    Ok(Json(ExecuteResponse {
        run_id: run.id,
        state: run.state,
        results: run.trail,
        error: run.error,
    }))
}

/// Checks a graph without running it.
#[instrument(skip_all)]
pub async fn validate_workflow(Json(request): Json<GraphRequest>) -> Json<ValidateResponse> {
    let modules = request.modules.unwrap_or_default();
    let connections = request.connections.unwrap_or_default();
    let errors = WorkflowGraph::from_parts(&modules, &connections).validate();

    Json(ValidateResponse {
        valid: errors.is_empty(),
        errors: errors.messages(),
    })
}
