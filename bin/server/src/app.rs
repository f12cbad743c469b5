//! Application state and router.

use crate::db::WorkflowStore;
use crate::routes;
use axum::Router;
use axum::routing::{get, post};
use defi_flow_workflow::{SimulatedChain, WorkflowEngine};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Shared state for all handlers.
pub struct AppState {
    /// Workflow persistence.
    pub store: Arc<dyn WorkflowStore>,
    /// Engine used by the execute endpoint.
    pub engine: WorkflowEngine<SimulatedChain>,
    /// Owner for requests without an `x-wallet-address` header.
    pub default_owner: String,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        engine: WorkflowEngine<SimulatedChain>,
        default_owner: impl Into<String>,
    ) -> Self {
        Self {
            store,
            engine,
            default_owner: default_owner.into(),
        }
    }

    /// How long a single execution may run.
    pub fn execution_timeout(&self) -> Duration {
        self.engine.config().execution_timeout()
    }
}

/// Builds the HTTP router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/api/workflows",
            get(routes::list_workflows).post(routes::create_workflow),
        )
        .route("/api/workflows/validate", post(routes::validate_workflow))
        .route(
            "/api/workflows/{id}",
            get(routes::get_workflow).delete(routes::delete_workflow),
        )
        .route(
            "/api/workflows/{id}/duplicate",
            post(routes::duplicate_workflow),
        )
        .route("/api/workflows/{id}/execute", post(routes::execute_workflow))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
