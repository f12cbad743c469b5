//! In-memory workflow store.

use super::{StoreResult, WorkflowStore};
use async_trait::async_trait;
use defi_flow_core::WorkflowId;
use defi_flow_workflow::Workflow;
use std::collections::HashMap;
use tokio::sync::RwLock;

struct StoredWorkflow {
    owner: String,
    workflow: Workflow,
}

/// Keeps workflows in process memory; everything is lost on restart.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<WorkflowId, StoredWorkflow>>,
}

impl InMemoryWorkflowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn create(&self, owner: &str, workflow: &Workflow) -> StoreResult<()> {
        self.workflows.write().await.insert(
            workflow.id,
            StoredWorkflow {
                owner: owner.to_string(),
                workflow: workflow.clone(),
            },
        );
        Ok(())
    }

    async fn list(&self, owner: &str) -> StoreResult<Vec<Workflow>> {
        let workflows = self.workflows.read().await;
        let mut owned: Vec<Workflow> = workflows
            .values()
            .filter(|stored| stored.owner == owner)
            .map(|stored| stored.workflow.clone())
            .collect();
        // ULIDs sort by creation time, breaking ties between equal timestamps
        owned.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(owned)
    }

    async fn get(&self, owner: &str, id: WorkflowId) -> StoreResult<Option<Workflow>> {
        let workflows = self.workflows.read().await;
        Ok(workflows
            .get(&id)
            .filter(|stored| stored.owner == owner)
            .map(|stored| stored.workflow.clone()))
    }

    async fn delete(&self, owner: &str, id: WorkflowId) -> StoreResult<bool> {
        let mut workflows = self.workflows.write().await;
        let owned = workflows
            .get(&id)
            .is_some_and(|stored| stored.owner == owner);
        if owned {
            workflows.remove(&id);
        }
        Ok(owned)
    }
}
