//! Workflow execution engine.
//!
//! Runs a workflow end to end:
//! 1. Builds the graph and validates its structure
//! 2. Resolves the execution order
//! 3. Executes modules one at a time, feeding each the amounts carried by
//!    its predecessors
//! 4. Stops at the first failed module
//!
//! A graph that fails step 1 or 2 is rejected before any module runs.

use crate::chain::{ChainAdapter, LatencyTable, SimulatedChain};
use crate::connection::Connection;
use crate::error::RejectionError;
use crate::execution::{ExecutionTrail, WorkflowRun};
use crate::executor::{InputState, OperationExecutor};
use crate::graph::WorkflowGraph;
use crate::module::{Module, ModuleId};
use crate::order::resolve_order;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Tuning for the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Input amount for entry points without a configured amount.
    pub seed_amount: f64,
    /// Multiplier for simulated chain latency; 0 disables waiting.
    pub latency_scale: f64,
    /// Upper bound on a whole run, enforced by callers.
    pub execution_timeout_secs: u64,
}

impl EngineConfig {
    #[must_use]
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed_amount: 100.0,
            latency_scale: 1.0,
            execution_timeout_secs: 120,
        }
    }
}

/// Amounts carried out of each completed module during one run.
#[derive(Debug, Default)]
struct FlowState {
    carried: HashMap<ModuleId, f64>,
}

impl FlowState {
    fn input_for(&self, graph: &WorkflowGraph, module: &Module, seed_amount: f64) -> InputState {
        let predecessors = graph.predecessors(&module.id);
        if predecessors.is_empty() {
            return InputState::new(module.config.amount().unwrap_or(seed_amount));
        }

        let amount = predecessors
            .iter()
            .map(|p| self.carried.get(&p.id).copied().unwrap_or_default())
            .sum();
        InputState::new(amount)
    }

    fn carry(&mut self, module_id: ModuleId, amount: f64) {
        self.carried.insert(module_id, amount);
    }
}

/// Executes workflows against a chain adapter.
#[derive(Debug)]
pub struct WorkflowEngine<C> {
    executor: OperationExecutor<C>,
    config: EngineConfig,
}

impl WorkflowEngine<SimulatedChain> {
    /// An engine backed by the simulated chain, with latency scaled per config.
    #[must_use]
    pub fn simulated(config: EngineConfig) -> Self {
        let chain = SimulatedChain::new(LatencyTable::scaled(config.latency_scale));
        Self::new(chain, config)
    }
}

impl<C: ChainAdapter> WorkflowEngine<C> {
    #[must_use]
    pub fn new(chain: C, config: EngineConfig) -> Self {
        Self {
            executor: OperationExecutor::new(chain),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs a workflow and returns the full run record.
    ///
    /// The run ends `rejected`, `failed` or `succeeded`; it never errors.
    #[instrument(skip_all, fields(modules = modules.len(), connections = connections.len()))]
    pub async fn run(&self, modules: &[Module], connections: &[Connection]) -> WorkflowRun {
        let mut run = WorkflowRun::new();
        let graph = WorkflowGraph::from_parts(modules, connections);

        let errors = graph.validate_structure();
        if !errors.is_empty() {
            warn!(run_id = %run.id, errors = %errors, "workflow rejected");
            run.reject(RejectionError::Invalid { errors });
            return run;
        }

        let order = match resolve_order(&graph) {
            Ok(order) => order,
            Err(e) => {
                warn!(run_id = %run.id, error = %e, "workflow rejected");
                run.reject(e.into());
                return run;
            }
        };

        run.start();
        info!(run_id = %run.id, steps = order.len(), "workflow run started");

        let mut flow = FlowState::default();
        for module_id in order.iter() {
            let Some(module) = graph.module(module_id) else {
                continue;
            };

            let input = flow.input_for(&graph, module, self.config.seed_amount);
            let result = self.executor.execute(module, &input).await;

            if let Some(output) = &result.output {
                flow.carry(module_id.clone(), output.carried_amount());
            }

            let failed = !result.is_success();
            run.record(result);
            if failed {
                warn!(run_id = %run.id, module_id = %module_id, "halting run after failed module");
                break;
            }
        }

        run.succeed();
        info!(
            run_id = %run.id,
            state = ?run.state,
            executed = run.trail.len(),
            "workflow run finished"
        );
        run
    }

    /// Runs a workflow and returns its trail.
    ///
    /// # Errors
    ///
    /// Returns a rejection if the graph is invalid or cyclic. A module failure
    /// is not an error; it is the last entry of the trail.
    pub async fn execute_workflow(
        &self,
        modules: &[Module],
        connections: &[Connection],
    ) -> defi_flow_core::Result<ExecutionTrail, RejectionError> {
        let run = self.run(modules, connections).await;
        match run.rejection {
            Some(rejection) => Err(rejection.into()),
            None => Ok(run.trail),
        }
    }
}
