//! Workflow execution records.
//!
//! A run moves through a small state machine:
//! - `pending` until the engine picks it up
//! - `running` while modules execute one at a time
//! - `succeeded`, `failed` (first module failure) or `rejected` (the graph
//!   could not be run at all)
//!
//! Every executed module leaves an [`ExecutionResult`] in the run's
//! [`ExecutionTrail`], in the order the modules ran.

use crate::chain::TransactionReceipt;
use crate::error::RejectionError;
use crate::executor::OperationOutput;
use crate::module::{ModuleId, ModuleType};
use chrono::{DateTime, Utc};
use defi_flow_core::WorkflowRunId;
use serde::{Deserialize, Serialize};

/// The overall state of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Run has been created but not started.
    Pending,
    /// Modules are executing.
    Running,
    /// Every module succeeded.
    Succeeded,
    /// A module failed; later modules did not run.
    Failed,
    /// The graph was refused before any module ran.
    Rejected,
}

impl ExecutionState {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Rejected)
    }
}

/// Outcome of a single module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
}

/// The record of one module's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub module_id: ModuleId,
    #[serde(rename = "type")]
    pub module_type: ModuleType,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionReceipt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OperationOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    /// A successful module execution.
    #[must_use]
    pub fn succeeded(
        module_id: ModuleId,
        module_type: ModuleType,
        transaction: TransactionReceipt,
        output: OperationOutput,
    ) -> Self {
        Self {
            module_id,
            module_type,
            status: StepStatus::Success,
            transaction: Some(transaction),
            output: Some(output),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// A failed module execution.
    #[must_use]
    pub fn failed(module_id: ModuleId, module_type: ModuleType, error: impl Into<String>) -> Self {
        Self {
            module_id,
            module_type,
            status: StepStatus::Failed,
            transaction: None,
            output: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// Ordered results of a run, truncated at the first failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionTrail(Vec<ExecutionResult>);

impl ExecutionTrail {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, result: ExecutionResult) {
        self.0.push(result);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.0.iter()
    }

    #[must_use]
    pub fn last(&self) -> Option<&ExecutionResult> {
        self.0.last()
    }

    /// The failed result, if the run stopped on one.
    #[must_use]
    pub fn failure(&self) -> Option<&ExecutionResult> {
        self.0.iter().find(|r| !r.is_success())
    }
}

impl<'a> IntoIterator for &'a ExecutionTrail {
    type Item = &'a ExecutionResult;
    type IntoIter = std::slice::Iter<'a, ExecutionResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A record of a single workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    /// Unique identifier for this run.
    pub id: WorkflowRunId,
    /// Current execution state.
    pub state: ExecutionState,
    /// When the run started executing.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Per-module results in execution order.
    #[serde(rename = "results")]
    pub trail: ExecutionTrail,
    /// Error message if failed or rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why the run was refused, if it was.
    #[serde(skip)]
    pub rejection: Option<RejectionError>,
}

impl WorkflowRun {
    /// Creates a new run in pending state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: WorkflowRunId::new(),
            state: ExecutionState::Pending,
            started_at: None,
            finished_at: None,
            trail: ExecutionTrail::new(),
            error: None,
            rejection: None,
        }
    }

    /// Starts the run.
    pub fn start(&mut self) {
        self.state = ExecutionState::Running;
        self.started_at = Some(Utc::now());
    }

    /// Appends a module result; a failed result fails the run.
    pub fn record(&mut self, result: ExecutionResult) {
        if !result.is_success() {
            self.state = ExecutionState::Failed;
            self.finished_at = Some(Utc::now());
            self.error = result.error.clone();
        }
        self.trail.push(result);
    }

    /// Marks the run as succeeded unless it already ended.
    pub fn succeed(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = ExecutionState::Succeeded;
        self.finished_at = Some(Utc::now());
    }

    /// Marks the run as refused.
    pub fn reject(&mut self, rejection: RejectionError) {
        self.state = ExecutionState::Rejected;
        self.finished_at = Some(Utc::now());
        self.error = Some(rejection.to_string());
        self.rejection = Some(rejection);
    }

    /// Returns the duration of the run, if it has started.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        let start = self.started_at?;
        let end = self.finished_at.unwrap_or_else(Utc::now);
        Some(end - start)
    }
}

impl Default for WorkflowRun {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrors;

    fn receipt() -> TransactionReceipt {
        TransactionReceipt {
            tx_hash: "0xabc".to_string(),
            block_number: 15_000_001,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn execution_state_terminal() {
        assert!(!ExecutionState::Pending.is_terminal());
        assert!(!ExecutionState::Running.is_terminal());
        assert!(ExecutionState::Succeeded.is_terminal());
        assert!(ExecutionState::Failed.is_terminal());
        assert!(ExecutionState::Rejected.is_terminal());
    }

    #[test]
    fn workflow_run_lifecycle() {
        let mut run = WorkflowRun::new();
        assert_eq!(run.state, ExecutionState::Pending);
        assert!(run.started_at.is_none());

        run.start();
        assert_eq!(run.state, ExecutionState::Running);

        run.record(ExecutionResult::succeeded(
            "A".into(),
            ModuleType::Stake,
            receipt(),
            OperationOutput::Stake {
                staked: 100.0,
                token: None,
            },
        ));
        run.succeed();

        assert_eq!(run.state, ExecutionState::Succeeded);
        assert_eq!(run.trail.len(), 1);
        assert!(run.finished_at.is_some());
        assert!(run.duration().is_some());
    }

    #[test]
    fn failed_result_fails_the_run() {
        let mut run = WorkflowRun::new();
        run.start();
        run.record(ExecutionResult::failed(
            "A".into(),
            ModuleType::Unknown("x".into()),
            "Unknown module type: x",
        ));
        run.succeed();

        assert_eq!(run.state, ExecutionState::Failed);
        assert_eq!(run.error.as_deref(), Some("Unknown module type: x"));
        assert_eq!(
            run.trail.failure().map(|r| r.module_id.as_str()),
            Some("A")
        );
    }

    #[test]
    fn rejected_run_keeps_reason() {
        let mut run = WorkflowRun::new();
        run.reject(RejectionError::Invalid {
            errors: ValidationErrors::new(),
        });

        assert_eq!(run.state, ExecutionState::Rejected);
        assert!(run.trail.is_empty());
        assert!(run.rejection.is_some());
    }

    #[test]
    fn result_wire_format() {
        let result = ExecutionResult::failed("B".into(), ModuleType::Swap, "boom");
        let json = serde_json::to_value(&result).expect("serialize");

        assert_eq!(json["moduleId"], "B");
        assert_eq!(json["type"], "swap");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "boom");
        assert!(json.get("transaction").is_none());
    }

    #[test]
    fn run_serializes_trail_as_results() {
        let run = WorkflowRun::new();
        let json = serde_json::to_value(&run).expect("serialize");
        assert_eq!(json["state"], "pending");
        assert!(json["results"].as_array().is_some_and(Vec::is_empty));
        assert!(json["id"].as_str().is_some_and(|id| id.starts_with("run_")));
    }
}
