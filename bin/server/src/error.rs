//! Domain error types for server operations.
//!
//! Store failures are reported as `Report<StoreError>` by the repositories.
//! Handlers convert everything into [`ApiError`], which logs the internal
//! detail and answers with a user-safe JSON body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use defi_flow_workflow::RejectionError;
use rootcause::Report;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Workflow storage errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Database error while accessing workflows.
    DatabaseError { details: String },
    /// A stored row could not be turned back into a workflow.
    CorruptRecord { id: String, details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DatabaseError { details } => {
                write!(f, "workflow database error: {details}")
            }
            Self::CorruptRecord { id, details } => {
                write!(f, "stored workflow '{id}' is unreadable: {details}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors returned by HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Invalid workflow ID format.
    InvalidId { id: String, reason: String },
    /// The request body is missing something.
    InvalidRequest { details: String },
    /// Workflow was not found.
    NotFound { id: String },
    /// The workflow graph cannot be executed.
    Rejected(RejectionError),
    /// Execution did not finish in time.
    Timeout { after: Duration },
    /// Storage failure.
    Store(Report<StoreError>),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId { id, reason } => write!(f, "invalid workflow id '{id}': {reason}"),
            Self::InvalidRequest { details } => write!(f, "invalid request: {details}"),
            Self::NotFound { id } => write!(f, "workflow '{id}' not found"),
            Self::Rejected(rejection) => write!(f, "{rejection}"),
            Self::Timeout { after } => {
                write!(f, "workflow execution exceeded {}s", after.as_secs())
            }
            Self::Store(report) => write!(f, "{report}"),
        }
    }
}

impl From<Report<StoreError>> for ApiError {
    fn from(report: Report<StoreError>) -> Self {
        Self::Store(report)
    }
}

impl From<RejectionError> for ApiError {
    fn from(rejection: RejectionError) -> Self {
        Self::Rejected(rejection)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

impl ApiError {
    /// Status code and user-safe body for this error.
    fn parts(&self) -> (StatusCode, ErrorBody) {
        let (status, error, details) = match self {
            Self::InvalidId { .. } => (StatusCode::BAD_REQUEST, "Invalid workflow ID", Vec::new()),
            Self::InvalidRequest { details } => (
                StatusCode::BAD_REQUEST,
                "Invalid workflow data",
                vec![details.clone()],
            ),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "Workflow not found", Vec::new()),
            Self::Rejected(rejection) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                match rejection {
                    RejectionError::Invalid { .. } => "Workflow is invalid",
                    RejectionError::CycleDetected { .. } => "Workflow contains a cycle",
                },
                rejection.details(),
            ),
            Self::Timeout { .. } => (
                StatusCode::GATEWAY_TIMEOUT,
                "Workflow execution timed out",
                Vec::new(),
            ),
            Self::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Vec::new(),
            ),
        };

        (
            status,
            ErrorBody {
                error: error.to_string(),
                details,
            },
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}
