//! Workflow graph built on petgraph.
//!
//! Workflows are directed graphs where:
//! - Nodes are modules
//! - Edges are connections from a source module to a target module
//!
//! The graph is built from the flat module and connection lists that clients
//! send and that the store persists. Node indices follow module order and edge
//! indices follow connection order, which keeps every traversal here
//! deterministic. Malformed input (duplicate ids, connections to unknown
//! modules) is recorded while building and reported by [`WorkflowGraph::validate`].

use crate::connection::{Connection, ConnectionId};
use crate::error::{Endpoint, ValidationError, ValidationErrors};
use crate::module::{Module, ModuleId};
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

/// A connection whose endpoint names a module that is not in the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingConnection {
    pub connection_id: ConnectionId,
    pub endpoint: Endpoint,
    pub module_id: ModuleId,
}

/// A workflow graph using petgraph's directed graph.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    graph: DiGraph<Module, Connection>,
    /// Map from ModuleId to petgraph's NodeIndex for O(1) lookup.
    index: HashMap<ModuleId, NodeIndex>,
    /// Every module id referenced by any connection, dangling ones included.
    connected: HashSet<ModuleId>,
    raw_connection_count: usize,
    duplicate_modules: Vec<ModuleId>,
    duplicate_connections: Vec<ConnectionId>,
    dangling: Vec<DanglingConnection>,
}

impl WorkflowGraph {
    /// Builds a graph from modules and connections.
    ///
    /// When two modules share an id the first one is kept. Connections with
    /// an unknown endpoint are left out of the graph.
    #[must_use]
    pub fn from_parts(modules: &[Module], connections: &[Connection]) -> Self {
        let mut graph = DiGraph::with_capacity(modules.len(), connections.len());
        let mut index = HashMap::with_capacity(modules.len());
        let mut duplicate_modules = Vec::new();

        for module in modules {
            if index.contains_key(&module.id) {
                duplicate_modules.push(module.id.clone());
                continue;
            }
            let idx = graph.add_node(module.clone());
            index.insert(module.id.clone(), idx);
        }

        let mut seen_connections = HashSet::with_capacity(connections.len());
        let mut duplicate_connections = Vec::new();
        let mut connected = HashSet::new();
        let mut dangling = Vec::new();

        for connection in connections {
            if !seen_connections.insert(connection.id.clone()) {
                duplicate_connections.push(connection.id.clone());
            }
            connected.insert(connection.source_id.clone());
            connected.insert(connection.target_id.clone());

            let source = index.get(&connection.source_id).copied();
            let target = index.get(&connection.target_id).copied();

            if source.is_none() {
                dangling.push(DanglingConnection {
                    connection_id: connection.id.clone(),
                    endpoint: Endpoint::Source,
                    module_id: connection.source_id.clone(),
                });
            }
            if target.is_none() {
                dangling.push(DanglingConnection {
                    connection_id: connection.id.clone(),
                    endpoint: Endpoint::Target,
                    module_id: connection.target_id.clone(),
                });
            }

            if let (Some(source), Some(target)) = (source, target) {
                graph.add_edge(source, target, connection.clone());
            }
        }

        Self {
            graph,
            index,
            connected,
            raw_connection_count: connections.len(),
            duplicate_modules,
            duplicate_connections,
            dangling,
        }
    }

    /// Returns a module by its id.
    #[must_use]
    pub fn module(&self, module_id: &ModuleId) -> Option<&Module> {
        let index = self.index.get(module_id)?;
        self.graph.node_weight(*index)
    }

    /// Returns all modules in input order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.graph.node_weights()
    }

    /// Returns the number of distinct modules in the graph.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of connections whose endpoints both exist.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns connections that reference unknown modules.
    #[must_use]
    pub fn dangling_connections(&self) -> &[DanglingConnection] {
        &self.dangling
    }

    /// Returns modules that have no incoming connections (entry points).
    pub fn entry_modules(&self) -> Vec<&Module> {
        self.modules_without(Direction::Incoming)
    }

    /// Returns modules that have no outgoing connections (terminal modules).
    pub fn terminal_modules(&self) -> Vec<&Module> {
        self.modules_without(Direction::Outgoing)
    }

    /// Returns the distinct downstream modules of a module, in connection order.
    pub fn successors(&self, module_id: &ModuleId) -> Vec<&Module> {
        self.neighbors(module_id, Direction::Outgoing)
    }

    /// Returns the distinct upstream modules of a module, in connection order.
    pub fn predecessors(&self, module_id: &ModuleId) -> Vec<&Module> {
        self.neighbors(module_id, Direction::Incoming)
    }

    pub(crate) fn inner(&self) -> &DiGraph<Module, Connection> {
        &self.graph
    }

    fn modules_without(&self, direction: Direction) -> Vec<&Module> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph.edges_directed(idx, direction).next().is_none())
            .filter_map(|idx| self.graph.node_weight(idx))
            .collect()
    }

    fn neighbors(&self, module_id: &ModuleId, direction: Direction) -> Vec<&Module> {
        let Some(&index) = self.index.get(module_id) else {
            return Vec::new();
        };

        // petgraph walks adjacency lists newest-first
        let mut edges: Vec<(EdgeIndex, NodeIndex)> = self
            .graph
            .edges_directed(index, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                (edge.id(), other)
            })
            .collect();
        edges.sort_by_key(|(edge, _)| *edge);

        let mut seen = HashSet::new();
        edges
            .into_iter()
            .filter(|(_, other)| seen.insert(*other))
            .filter_map(|(_, other)| self.graph.node_weight(other))
            .collect()
    }

    /// Validates everything except acyclicity.
    ///
    /// Checks:
    /// - The workflow has at least one module
    /// - Module and connection ids are unique
    /// - Every connection endpoint names an existing module
    /// - No module is left unconnected once any connection exists
    /// - Module configs are within range
    #[must_use]
    pub fn validate_structure(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        if self.graph.node_count() == 0 {
            errors.push(ValidationError::Empty);
        }

        for module_id in &self.duplicate_modules {
            errors.push(ValidationError::DuplicateModule {
                module_id: module_id.clone(),
            });
        }

        for connection_id in &self.duplicate_connections {
            errors.push(ValidationError::DuplicateConnection {
                connection_id: connection_id.clone(),
            });
        }

        for dangling in &self.dangling {
            errors.push(ValidationError::DanglingConnection {
                connection_id: dangling.connection_id.clone(),
                endpoint: dangling.endpoint,
                module_id: dangling.module_id.clone(),
            });
        }

        if self.raw_connection_count > 0 {
            for module in self.modules() {
                if !self.connected.contains(&module.id) {
                    errors.push(ValidationError::OrphanedModule {
                        module_id: module.id.clone(),
                    });
                }
            }
        }

        for module in self.modules() {
            for reason in module.config.problems() {
                errors.push(ValidationError::InvalidConfig {
                    module_id: module.id.clone(),
                    reason,
                });
            }
        }

        errors
    }

    /// Validates the workflow graph, accumulating every problem found.
    ///
    /// Runs [`validate_structure`](Self::validate_structure) and then a
    /// depth-first search for cycles. An empty result means the graph may be
    /// executed.
    #[must_use]
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = self.validate_structure();
        for path in self.find_cycles() {
            errors.push(ValidationError::CycleDetected { path });
        }
        errors
    }

    /// Depth-first search that reports a path for every back edge found.
    ///
    /// Frames live on an explicit stack, never the call stack.
    fn find_cycles(&self) -> Vec<Vec<ModuleId>> {
        let mut visited = HashSet::new();
        let mut on_path = HashSet::new();
        let mut cycles = Vec::new();

        for start in self.graph.node_indices() {
            if visited.contains(&start) {
                continue;
            }

            visited.insert(start);
            on_path.insert(start);
            let mut stack = vec![(start, self.outgoing_targets(start), 0usize)];

            while let Some((node, targets, cursor)) = stack.last_mut() {
                let Some(&next) = targets.get(*cursor) else {
                    let done = *node;
                    on_path.remove(&done);
                    stack.pop();
                    continue;
                };
                *cursor += 1;

                if on_path.contains(&next) {
                    if let Some(from) = stack.iter().position(|(n, _, _)| *n == next) {
                        let mut cycle: Vec<ModuleId> =
                            stack[from..].iter().map(|(n, _, _)| self.id_of(*n)).collect();
                        cycle.push(self.id_of(next));
                        cycles.push(cycle);
                    }
                } else if visited.insert(next) {
                    on_path.insert(next);
                    stack.push((next, self.outgoing_targets(next), 0));
                }
            }
        }

        cycles
    }

    /// Outgoing targets of a node, in connection order.
    fn outgoing_targets(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut targets: Vec<(EdgeIndex, NodeIndex)> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| (edge.id(), edge.target()))
            .collect();
        targets.sort_by_key(|(edge, _)| *edge);
        targets.into_iter().map(|(_, target)| target).collect()
    }

    fn id_of(&self, index: NodeIndex) -> ModuleId {
        self.graph[index].id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleConfig, SwapConfig};

    fn swap(id: &str) -> Module {
        Module::new(id, "swap")
    }

    fn ids(modules: &[&Module]) -> Vec<String> {
        modules.iter().map(|m| m.id.to_string()).collect()
    }

    #[test]
    fn builds_graph_in_input_order() {
        let graph = WorkflowGraph::from_parts(
            &[swap("A"), swap("B"), swap("C")],
            &[Connection::new("c1", "A", "B"), Connection::new("c2", "A", "C")],
        );

        assert_eq!(graph.module_count(), 3);
        assert_eq!(graph.connection_count(), 2);
        assert_eq!(ids(&graph.entry_modules()), vec!["A"]);
        assert_eq!(ids(&graph.terminal_modules()), vec!["B", "C"]);
        assert_eq!(ids(&graph.successors(&"A".into())), vec!["B", "C"]);
        assert!(graph.module(&"B".into()).is_some());
    }

    #[test]
    fn predecessors_are_distinct_and_in_connection_order() {
        let graph = WorkflowGraph::from_parts(
            &[swap("A"), swap("B"), swap("C")],
            &[
                Connection::new("c1", "B", "C"),
                Connection::new("c2", "A", "C"),
                Connection::new("c3", "B", "C"),
            ],
        );

        assert_eq!(ids(&graph.predecessors(&"C".into())), vec!["B", "A"]);
    }

    #[test]
    fn valid_chain_has_no_errors() {
        let graph = WorkflowGraph::from_parts(
            &[swap("A"), Module::new("B", "stake")],
            &[Connection::new("c1", "A", "B")],
        );
        assert!(graph.validate().is_empty());
    }

    #[test]
    fn single_unconnected_module_is_valid() {
        let graph = WorkflowGraph::from_parts(&[swap("A")], &[]);
        assert!(graph.validate().is_empty());
    }

    #[test]
    fn empty_workflow_is_invalid() {
        let graph = WorkflowGraph::from_parts(&[], &[]);
        let errors: Vec<_> = graph.validate().into_iter().collect();
        assert_eq!(errors, vec![ValidationError::Empty]);
    }

    #[test]
    fn dangling_connection_is_reported() {
        let graph = WorkflowGraph::from_parts(&[swap("A")], &[Connection::new("c1", "A", "Z")]);

        let errors: Vec<_> = graph.validate().into_iter().collect();
        assert_eq!(
            errors,
            vec![ValidationError::DanglingConnection {
                connection_id: "c1".into(),
                endpoint: Endpoint::Target,
                module_id: "Z".into(),
            }]
        );
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn orphan_is_flagged_once_connections_exist() {
        let graph = WorkflowGraph::from_parts(
            &[swap("A"), swap("B"), swap("C")],
            &[Connection::new("c1", "A", "B")],
        );

        let errors: Vec<_> = graph.validate().into_iter().collect();
        assert_eq!(
            errors,
            vec![ValidationError::OrphanedModule {
                module_id: "C".into()
            }]
        );
    }

    #[test]
    fn duplicate_ids_are_reported_and_first_module_wins() {
        let graph = WorkflowGraph::from_parts(
            &[swap("A"), Module::new("A", "stake"), swap("B")],
            &[Connection::new("c1", "A", "B"), Connection::new("c1", "A", "B")],
        );

        let errors: Vec<_> = graph.validate_structure().into_iter().collect();
        assert!(errors.contains(&ValidationError::DuplicateModule {
            module_id: "A".into()
        }));
        assert!(errors.contains(&ValidationError::DuplicateConnection {
            connection_id: "c1".into()
        }));
        assert_eq!(graph.module_count(), 2);
        assert_eq!(
            graph.module(&"A".into()).map(|m| m.module_type.as_str()),
            Some("swap")
        );
    }

    #[test]
    fn cycle_is_reported_with_path() {
        let graph = WorkflowGraph::from_parts(
            &[swap("A"), swap("B")],
            &[Connection::new("c1", "A", "B"), Connection::new("c2", "B", "A")],
        );

        assert!(graph.validate_structure().is_empty());
        let errors: Vec<_> = graph.validate().into_iter().collect();
        assert_eq!(
            errors,
            vec![ValidationError::CycleDetected {
                path: vec!["A".into(), "B".into(), "A".into()]
            }]
        );
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let graph = WorkflowGraph::from_parts(&[swap("A")], &[Connection::new("c1", "A", "A")]);

        let errors: Vec<_> = graph.validate().into_iter().collect();
        assert_eq!(
            errors,
            vec![ValidationError::CycleDetected {
                path: vec!["A".into(), "A".into()]
            }]
        );
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let graph = WorkflowGraph::from_parts(
            &[swap("A"), swap("B"), swap("C"), swap("D")],
            &[
                Connection::new("c1", "A", "B"),
                Connection::new("c2", "A", "C"),
                Connection::new("c3", "B", "D"),
                Connection::new("c4", "C", "D"),
            ],
        );
        assert!(graph.validate().is_empty());
    }

    #[test]
    fn out_of_range_config_is_reported() {
        let bad = swap("A").with_config(ModuleConfig::Swap(SwapConfig {
            slippage: Some(150.0),
            ..SwapConfig::default()
        }));
        let graph = WorkflowGraph::from_parts(&[bad], &[]);

        let errors: Vec<_> = graph.validate().into_iter().collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ValidationError::InvalidConfig { module_id, .. } if module_id.as_str() == "A"
        ));
    }

    fn chain(count: usize) -> (Vec<Module>, Vec<Connection>) {
        let modules = (0..count).map(|i| swap(&format!("m{i}"))).collect();
        let connections = (1..count)
            .map(|i| Connection::new(format!("c{i}"), format!("m{}", i - 1), format!("m{i}")))
            .collect();
        (modules, connections)
    }

    #[test]
    fn long_chain_validates_on_a_small_stack() {
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let (modules, mut connections) = chain(50_000);
                let acyclic = WorkflowGraph::from_parts(&modules, &connections).validate();

                connections.push(Connection::new("back", "m49999", "m0"));
                let cyclic = WorkflowGraph::from_parts(&modules, &connections).validate();
                (acyclic, cyclic)
            })
            .expect("spawn validator thread");

        let (acyclic, cyclic) = handle.join().expect("validation completes");
        assert!(acyclic.is_empty());

        let errors: Vec<_> = cyclic.into_iter().collect();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            ValidationError::CycleDetected { path } => {
                assert_eq!(path.len(), 50_001);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }
}
