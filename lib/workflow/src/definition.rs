//! Workflow definition types.
//!
//! A workflow is a named, stored automation that consists of:
//! - Metadata (name, description, timestamps)
//! - The modules placed on the canvas
//! - The connections between them

use crate::connection::Connection;
use crate::error::ValidationErrors;
use crate::graph::WorkflowGraph;
use crate::module::Module;
use chrono::{DateTime, Utc};
use defi_flow_core::WorkflowId;
use serde::{Deserialize, Serialize};

/// Suffix appended to the name of a duplicated workflow.
pub const COPY_SUFFIX: &str = " (Copy)";

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Unique identifier for this workflow.
    pub id: WorkflowId,
    /// Human-readable name for this workflow.
    pub name: String,
    /// Description of what this workflow does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// When this workflow was created.
    pub created_at: DateTime<Utc>,
    /// When this workflow was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Creates a new workflow with the given name and graph.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        modules: Vec<Module>,
        connections: Vec<Connection>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            description: None,
            modules,
            connections,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builds the graph view of this workflow.
    #[must_use]
    pub fn graph(&self) -> WorkflowGraph {
        WorkflowGraph::from_parts(&self.modules, &self.connections)
    }

    /// Validates the workflow graph.
    #[must_use]
    pub fn validate(&self) -> ValidationErrors {
        self.graph().validate()
    }

    /// Copies this workflow under a new id, with " (Copy)" appended to the name.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::new(),
            name: format!("{}{COPY_SUFFIX}", self.name),
            description: self.description.clone(),
            modules: self.modules.clone(),
            connections: self.connections.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Summary information about a workflow (for listings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub module_count: usize,
    pub connection_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Workflow> for WorkflowSummary {
    fn from(workflow: &Workflow) -> Self {
        Self {
            id: workflow.id,
            name: workflow.name.clone(),
            description: workflow.description.clone(),
            module_count: workflow.modules.len(),
            connection_count: workflow.connections.len(),
            created_at: workflow.created_at,
            updated_at: workflow.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Workflow {
        Workflow::new(
            "Yield loop",
            vec![Module::new("A", "swap"), Module::new("B", "stake")],
            vec![Connection::new("c1", "A", "B")],
        )
        .with_description("swap then stake")
    }

    #[test]
    fn workflow_creation() {
        let workflow = sample();
        assert_eq!(workflow.name, "Yield loop");
        assert_eq!(workflow.created_at, workflow.updated_at);
        assert!(workflow.validate().is_empty());
    }

    #[test]
    fn duplicate_gets_new_id_and_copy_name() {
        let original = sample();
        let copy = original.duplicate();

        assert_ne!(copy.id, original.id);
        assert_eq!(copy.name, "Yield loop (Copy)");
        assert_eq!(copy.modules, original.modules);
        assert_eq!(copy.connections, original.connections);
    }

    #[test]
    fn workflow_summary_from_workflow() {
        let workflow = sample();
        let summary = WorkflowSummary::from(&workflow);

        assert_eq!(summary.id, workflow.id);
        assert_eq!(summary.module_count, 2);
        assert_eq!(summary.connection_count, 1);
    }

    #[test]
    fn workflow_wire_format() {
        let workflow = sample();
        let json = serde_json::to_value(&workflow).expect("serialize");

        assert!(json["id"].as_str().is_some_and(|id| id.starts_with("wf_")));
        assert_eq!(json["modules"][0]["type"], "swap");
        assert_eq!(json["connections"][0]["sourceId"], "A");
        assert!(json.get("createdAt").is_some());

        let parsed: Workflow = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed.id, workflow.id);
    }
}
