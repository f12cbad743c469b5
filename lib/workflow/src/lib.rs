//! Workflow engine for defi-flow.
//!
//! This crate provides the workflow model and the engine that runs it:
//!
//! - **Graph Model**: Modules and connections in a petgraph directed graph,
//!   with validation
//! - **Order Resolver**: Deterministic topological ordering (Kahn's algorithm)
//! - **Operation Executor**: Per-type amount arithmetic and chain submission
//! - **Engine**: Sequential execution that halts on the first failure

pub mod chain;
pub mod connection;
pub mod definition;
pub mod engine;
pub mod error;
pub mod execution;
pub mod executor;
pub mod graph;
pub mod module;
pub mod order;

pub use chain::{ChainAdapter, ChainError, LatencyTable, SimulatedChain, TransactionReceipt};
pub use connection::{Connection, ConnectionId};
pub use definition::{Workflow, WorkflowSummary};
pub use engine::{EngineConfig, WorkflowEngine};
pub use error::{OperationError, RejectionError, ResolveError, ValidationError, ValidationErrors};
pub use execution::{ExecutionResult, ExecutionState, ExecutionTrail, StepStatus, WorkflowRun};
pub use executor::{InputState, OperationExecutor, OperationOutput};
pub use graph::WorkflowGraph;
pub use module::{Module, ModuleConfig, ModuleId, ModuleType, Position};
pub use order::{ExecutionOrder, resolve_order};
