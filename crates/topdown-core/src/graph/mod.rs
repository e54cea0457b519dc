//! Dependency graph engine.
//!
//! The graph is ephemeral: it is rebuilt from the row set for every query
//! and never persisted. Building it never fails; dangling references and
//! self-loops are represented as data and surfaced by the queries.
//!
//! ## Edge Direction Convention
//!
//! Edges in the underlying `petgraph::DiGraph` point from **dependent to
//! dependency**: if row `b` lists `a` in `depends`, the edge is `b -> a`.
//! Only references that resolve to an existing row become edges. The
//! per-node [`DependencyNode::depends`] list keeps every reference verbatim,
//! and [`DependencyNode::dependents`] is the reverse index over resolved ones.
//!
//! ## Ordering
//!
//! Nodes are kept in row order and every traversal follows `depends` /
//! `dependents` in list order, so all query results are deterministic.
//!
//! ## Queries
//!
//! - [`DependencyGraph::detect_cycles`]: DFS cycle listing
//! - [`DependencyGraph::topological_sort`]: Kahn's algorithm
//! - [`DependencyGraph::affected_downstream`] / [`DependencyGraph::impact_levels`]: impact analysis
//! - [`DependencyGraph::compute_max_depth`]: longest dependency chain
//! - [`DependencyGraph::rows_in_cycles`]: strongly connected component membership

mod cycles;
mod traversal;

pub use traversal::TopologicalOrder;

use crate::domain::{Row, RowId};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use tracing::warn;

/// A node of the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    /// Row id
    pub id: RowId,
    /// Declared dependencies, including ids that do not exist
    pub depends: Vec<RowId>,
    /// Rows whose `depends` resolve to this node, in row order
    pub dependents: Vec<RowId>,
}

/// Dependency graph built from a row set.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Nodes carry their [`DependencyNode`]; edges are resolved `depends` references.
    graph: DiGraph<DependencyNode, ()>,

    /// Mapping from row id to graph node.
    node_map: HashMap<RowId, NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph for `rows` in O(V + E).
    ///
    /// If two rows share an id the first one wins; duplicates are expected
    /// to be removed before rows reach the graph.
    pub fn build<R: AsRef<Row>>(rows: &[R]) -> Self {
        let mut graph = DiGraph::with_capacity(rows.len(), rows.len());
        let mut node_map = HashMap::with_capacity(rows.len());
        let mut sources = Vec::with_capacity(rows.len());

        for row in rows {
            let row = row.as_ref();
            if node_map.contains_key(&row.id) {
                warn!(row_id = %row.id, "Duplicate row id ignored while building graph");
                continue;
            }
            let node = graph.add_node(DependencyNode {
                id: row.id.clone(),
                depends: row.depends.clone(),
                dependents: Vec::new(),
            });
            node_map.insert(row.id.clone(), node);
            sources.push(node);
        }

        for source in sources {
            let depends = graph[source].depends.clone();
            for dep in &depends {
                let Some(&target) = node_map.get(dep) else {
                    continue;
                };
                let dependent_id = graph[source].id.clone();
                graph[target].dependents.push(dependent_id);
                graph.add_edge(source, target, ());
            }
        }

        Self { graph, node_map }
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Whether a node with this id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.node_map.contains_key(id)
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&DependencyNode> {
        self.node_map.get(id).map(|&index| &self.graph[index])
    }

    /// All nodes in row order.
    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.graph.node_indices().map(|index| &self.graph[index])
    }

    /// `(row, missing dependency)` pairs for references that resolve to no row.
    #[must_use]
    pub fn dangling_dependencies(&self) -> Vec<(RowId, RowId)> {
        self.nodes()
            .flat_map(|node| {
                node.depends
                    .iter()
                    .filter(|dep| !self.contains(dep.as_str()))
                    .map(|dep| (node.id.clone(), dep.clone()))
            })
            .collect()
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.node_map.get(id).copied()
    }

    pub(crate) fn digraph(&self) -> &DiGraph<DependencyNode, ()> {
        &self.graph
    }

    /// Resolved dependency nodes of `index`, in `depends` order.
    pub(crate) fn resolved_depends(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph[index]
            .depends
            .iter()
            .filter_map(|dep| self.index_of(dep.as_str()))
    }

    /// Dependent nodes of `index`, in row order.
    pub(crate) fn resolved_dependents(
        &self,
        index: NodeIndex,
    ) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph[index]
            .dependents
            .iter()
            .filter_map(|dep| self.index_of(dep.as_str()))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::rows;
    use super::*;

    #[test]
    fn test_build_creates_reverse_index() {
        let graph = DependencyGraph::build(&rows(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["b", "a"]),
        ]));

        assert_eq!(graph.len(), 3);
        let a = graph.node("a").unwrap();
        assert_eq!(a.dependents, vec![RowId::new("b"), RowId::new("c")]);
        assert_eq!(graph.node("b").unwrap().dependents, vec![RowId::new("c")]);
        assert!(graph.node("c").unwrap().dependents.is_empty());
    }

    #[test]
    fn test_build_keeps_dangling_references_verbatim() {
        let graph = DependencyGraph::build(&rows(&[("a", &["ghost", "b"]), ("b", &[])]));

        let a = graph.node("a").unwrap();
        assert_eq!(a.depends, vec![RowId::new("ghost"), RowId::new("b")]);
        assert!(!graph.contains("ghost"));
        assert_eq!(
            graph.dangling_dependencies(),
            vec![(RowId::new("a"), RowId::new("ghost"))]
        );
        assert_eq!(graph.digraph().edge_count(), 1);
    }

    #[test]
    fn test_build_tolerates_self_loop() {
        let graph = DependencyGraph::build(&rows(&[("a", &["a"])]));
        assert_eq!(graph.node("a").unwrap().dependents, vec![RowId::new("a")]);
    }

    #[test]
    fn test_build_ignores_duplicate_ids() {
        let graph = DependencyGraph::build(&rows(&[("a", &[]), ("a", &["x"])]));
        assert_eq!(graph.len(), 1);
        assert!(graph.node("a").unwrap().depends.is_empty());
    }

    #[test]
    fn test_nodes_iterate_in_row_order() {
        let graph = DependencyGraph::build(&rows(&[("z", &[]), ("m", &[]), ("a", &[])]));
        let ids: Vec<_> = graph.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "m", "a"]);
    }
}
