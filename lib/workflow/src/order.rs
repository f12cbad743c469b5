//! Execution ordering for workflow graphs.
//!
//! Uses Kahn's algorithm with a FIFO queue seeded in module order, so two
//! modules that become ready at the same time always run in the order they
//! appear in the workflow.

use crate::error::ResolveError;
use crate::graph::WorkflowGraph;
use crate::module::ModuleId;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::VecDeque;

/// A topologically valid sequence of module ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionOrder(Vec<ModuleId>);

impl ExecutionOrder {
    pub fn iter(&self) -> impl Iterator<Item = &ModuleId> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of a module in the order, if present.
    #[must_use]
    pub fn position(&self, module_id: &ModuleId) -> Option<usize> {
        self.0.iter().position(|id| id == module_id)
    }
}

impl IntoIterator for ExecutionOrder {
    type Item = ModuleId;
    type IntoIter = std::vec::IntoIter<ModuleId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Computes the order in which modules run.
///
/// # Errors
///
/// Returns [`ResolveError::DanglingConnection`] if a connection names an
/// unknown module, and [`ResolveError::CycleDetected`] if not every module
/// can be ordered. No partial order is ever returned.
pub fn resolve_order(graph: &WorkflowGraph) -> Result<ExecutionOrder, ResolveError> {
    if let Some(dangling) = graph.dangling_connections().first() {
        return Err(ResolveError::DanglingConnection {
            connection_id: dangling.connection_id.clone(),
            endpoint: dangling.endpoint,
            module_id: dangling.module_id.clone(),
        });
    }

    let inner = graph.inner();
    let node_count = inner.node_count();

    let mut in_degree = vec![0usize; node_count];
    let mut adjacency: Vec<Vec<NodeIndex>> = vec![Vec::new(); node_count];
    for edge in inner.edge_references() {
        adjacency[edge.source().index()].push(edge.target());
        in_degree[edge.target().index()] += 1;
    }

    let mut queue: VecDeque<NodeIndex> = inner
        .node_indices()
        .filter(|idx| in_degree[idx.index()] == 0)
        .collect();

    let mut order = Vec::with_capacity(node_count);
    while let Some(current) = queue.pop_front() {
        order.push(inner[current].id.clone());
        for &next in &adjacency[current.index()] {
            let degree = &mut in_degree[next.index()];
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() < node_count {
        let modules = inner
            .node_indices()
            .filter(|idx| in_degree[idx.index()] > 0)
            .map(|idx| inner[idx].id.clone())
            .collect();
        return Err(ResolveError::CycleDetected { modules });
    }

    Ok(ExecutionOrder(order))
}
