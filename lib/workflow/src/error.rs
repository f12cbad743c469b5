//! Error types for the workflow crate.
//!
//! Errors fall into two levels:
//! - Rejection-level (`ValidationError`, `ResolveError`, `RejectionError`): the
//!   graph cannot be run at all; no module executes.
//! - Node-level (`OperationError`): one module failed; it becomes a `failed`
//!   entry in the trail rather than an error returned by the engine.
//!
//! Rejections are handed to callers as `rootcause::Report<RejectionError>`.

use crate::chain::ChainError;
use crate::connection::ConnectionId;
use crate::module::ModuleId;
use std::fmt;

/// Which end of a connection a message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Source,
    Target,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// A module config that could not be read for its module type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub module_id: String,
    pub reason: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid config for module '{}': {}",
            self.module_id, self.reason
        )
    }
}

impl std::error::Error for ConfigError {}

/// A single graph-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The workflow has no modules.
    Empty,
    /// Two modules share an id.
    DuplicateModule { module_id: ModuleId },
    /// Two connections share an id.
    DuplicateConnection { connection_id: ConnectionId },
    /// A connection references a module that does not exist.
    DanglingConnection {
        connection_id: ConnectionId,
        endpoint: Endpoint,
        module_id: ModuleId,
    },
    /// A module takes part in no connection while other modules are connected.
    OrphanedModule { module_id: ModuleId },
    /// The connections form a cycle; `path` starts and ends on the same module.
    CycleDetected { path: Vec<ModuleId> },
    /// A config value is out of range for its module type.
    InvalidConfig { module_id: ModuleId, reason: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "workflow has no modules"),
            Self::DuplicateModule { module_id } => {
                write!(f, "duplicate module id '{module_id}'")
            }
            Self::DuplicateConnection { connection_id } => {
                write!(f, "duplicate connection id '{connection_id}'")
            }
            Self::DanglingConnection {
                connection_id,
                endpoint,
                module_id,
            } => write!(
                f,
                "connection '{connection_id}' {endpoint} references unknown module '{module_id}'"
            ),
            Self::OrphanedModule { module_id } => {
                write!(f, "module '{module_id}' is not connected to the workflow")
            }
            Self::CycleDetected { path } => {
                write!(f, "cycle detected: {}", join_ids(path, " -> "))
            }
            Self::InvalidConfig { module_id, reason } => {
                write!(f, "module '{module_id}' has invalid config: {reason}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// The accumulated result of validating a workflow graph.
///
/// An empty list means the graph may be executed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Human-readable messages, one per error.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = ValidationError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Errors from computing an execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Modules that could not be ordered because they sit on or behind a cycle.
    CycleDetected { modules: Vec<ModuleId> },
    /// A connection endpoint does not exist.
    DanglingConnection {
        connection_id: ConnectionId,
        endpoint: Endpoint,
        module_id: ModuleId,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CycleDetected { modules } => write!(
                f,
                "dependency cycle prevents ordering modules: {}",
                join_ids(modules, ", ")
            ),
            Self::DanglingConnection {
                connection_id,
                endpoint,
                module_id,
            } => write!(
                f,
                "connection '{connection_id}' {endpoint} references unknown module '{module_id}'"
            ),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Node-level failure while executing a single module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// The module's type is not one the executor knows.
    UnknownModuleType { module_type: String },
    /// The amount flowing into the module overflowed to infinity or NaN.
    NonFiniteAmount,
    /// The chain adapter refused or failed the operation.
    Chain(ChainError),
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownModuleType { module_type } => {
                write!(f, "Unknown module type: {module_type}")
            }
            Self::NonFiniteAmount => write!(f, "input amount is not a finite number"),
            Self::Chain(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for OperationError {}

impl From<ChainError> for OperationError {
    fn from(e: ChainError) -> Self {
        Self::Chain(e)
    }
}

/// Why a run was refused before any module executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionError {
    /// The graph failed validation.
    Invalid { errors: ValidationErrors },
    /// The graph contains a dependency cycle.
    CycleDetected { modules: Vec<ModuleId> },
}

impl RejectionError {
    /// Human-readable details for display next to the rejection.
    #[must_use]
    pub fn details(&self) -> Vec<String> {
        match self {
            Self::Invalid { errors } => errors.messages(),
            Self::CycleDetected { modules } => modules.iter().map(ToString::to_string).collect(),
        }
    }
}

impl fmt::Display for RejectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { errors } => write!(f, "workflow is invalid: {errors}"),
            Self::CycleDetected { modules } => write!(
                f,
                "workflow contains a dependency cycle involving: {}",
                join_ids(modules, ", ")
            ),
        }
    }
}

impl std::error::Error for RejectionError {}

impl From<ResolveError> for RejectionError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::CycleDetected { modules } => Self::CycleDetected { modules },
            ResolveError::DanglingConnection {
                connection_id,
                endpoint,
                module_id,
            } => Self::Invalid {
                errors: ValidationErrors(vec![ValidationError::DanglingConnection {
                    connection_id,
                    endpoint,
                    module_id,
                }]),
            },
        }
    }
}

fn join_ids(ids: &[ModuleId], separator: &str) -> String {
    ids.iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_module_type_message() {
        let err = OperationError::UnknownModuleType {
            module_type: "unknown-type".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown module type: unknown-type");
    }

    #[test]
    fn cycle_message_lists_path() {
        let err = ValidationError::CycleDetected {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "cycle detected: A -> B -> A");
    }

    #[test]
    fn validation_errors_join_messages() {
        let errors: ValidationErrors = vec![
            ValidationError::Empty,
            ValidationError::OrphanedModule {
                module_id: "C".into(),
            },
        ]
        .into_iter()
        .collect();

        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.to_string(),
            "workflow has no modules; module 'C' is not connected to the workflow"
        );
    }

    #[test]
    fn rejection_from_cycle_keeps_modules() {
        let rejection = RejectionError::from(ResolveError::CycleDetected {
            modules: vec!["A".into(), "B".into()],
        });
        assert_eq!(rejection.details(), vec!["A", "B"]);
        assert!(rejection.to_string().contains("A, B"));
    }
}
