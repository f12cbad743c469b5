//! Workflow persistence.
//!
//! Workflows are stored per owner (a wallet address). Two stores are
//! provided:
//! - [`InMemoryWorkflowStore`] for development and tests
//! - [`PgWorkflowStore`] backed by PostgreSQL

pub mod memory;
pub mod workflow;

pub use memory::InMemoryWorkflowStore;
pub use workflow::PgWorkflowStore;

use crate::error::StoreError;
use async_trait::async_trait;
use defi_flow_core::WorkflowId;
use defi_flow_workflow::Workflow;

/// Result type for store operations.
pub type StoreResult<T> = defi_flow_core::Result<T, StoreError>;

/// Storage for workflow definitions, scoped by owner.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Saves a new workflow for an owner.
    async fn create(&self, owner: &str, workflow: &Workflow) -> StoreResult<()>;

    /// Lists an owner's workflows, newest first.
    async fn list(&self, owner: &str) -> StoreResult<Vec<Workflow>>;

    /// Finds one of an owner's workflows.
    async fn get(&self, owner: &str, id: WorkflowId) -> StoreResult<Option<Workflow>>;

    /// Deletes one of an owner's workflows, returning whether it existed.
    async fn delete(&self, owner: &str, id: WorkflowId) -> StoreResult<bool>;

    /// Stores a copy of a workflow under a new id.
    ///
    /// Returns `None` if the original does not exist for this owner.
    async fn duplicate(&self, owner: &str, id: WorkflowId) -> StoreResult<Option<Workflow>> {
        let Some(original) = self.get(owner, id).await? else {
            return Ok(None);
        };

        let copy = original.duplicate();
        self.create(owner, &copy).await?;
        Ok(Some(copy))
    }
}
