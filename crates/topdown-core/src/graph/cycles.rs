//! Cycle detection.

use super::DependencyGraph;
use crate::domain::RowId;
use petgraph::algo;
use petgraph::graph::NodeIndex;
use std::collections::HashSet;

/// DFS state for cycle listing (white/gray/black colouring).
struct CycleSearch<'g> {
    graph: &'g DependencyGraph,
    /// Black or gray nodes
    visited: HashSet<NodeIndex>,
    /// Gray nodes (on the recursion stack)
    on_stack: HashSet<NodeIndex>,
    /// Current DFS path
    path: Vec<NodeIndex>,
    cycles: Vec<Vec<RowId>>,
}

impl CycleSearch<'_> {
    fn visit(&mut self, node: NodeIndex) {
        self.visited.insert(node);
        self.on_stack.insert(node);
        self.path.push(node);

        let neighbors: Vec<NodeIndex> = self.graph.resolved_depends(node).collect();
        for neighbor in neighbors {
            if !self.visited.contains(&neighbor) {
                self.visit(neighbor);
            } else if self.on_stack.contains(&neighbor) {
                self.record_cycle(neighbor);
            }
        }

        self.path.pop();
        self.on_stack.remove(&node);
    }

    /// Record the path slice from `closing` back to itself.
    fn record_cycle(&mut self, closing: NodeIndex) {
        let Some(start) = self.path.iter().position(|&n| n == closing) else {
            return;
        };
        let digraph = self.graph.digraph();
        let mut cycle: Vec<RowId> = self.path[start..]
            .iter()
            .map(|&n| digraph[n].id.clone())
            .collect();
        cycle.push(digraph[closing].id.clone());
        self.cycles.push(cycle);
    }
}

impl DependencyGraph {
    /// List dependency cycles.
    ///
    /// Each cycle starts and ends with the same id, e.g. `[a, b, c, a]`.
    /// Every node is used as a DFS root in row order unless already explored,
    /// so disjoint cycles are all reported. A fully explored node is never
    /// revisited, so a cycle reachable through several paths is listed once.
    #[must_use]
    pub fn detect_cycles(&self) -> Vec<Vec<RowId>> {
        let mut search = CycleSearch {
            graph: self,
            visited: HashSet::with_capacity(self.len()),
            on_stack: HashSet::new(),
            path: Vec::new(),
            cycles: Vec::new(),
        };

        for node in self.digraph().node_indices() {
            if !search.visited.contains(&node) {
                search.visit(node);
            }
        }

        search.cycles
    }

    /// Ids of every row that participates in a cycle, in row order.
    ///
    /// A row participates when its strongly connected component has more
    /// than one member or when it depends on itself. Unlike
    /// [`detect_cycles`](Self::detect_cycles) this finds every member even
    /// when overlapping cycles share nodes.
    #[must_use]
    pub fn rows_in_cycles(&self) -> Vec<RowId> {
        let digraph = self.digraph();
        let mut members: HashSet<NodeIndex> = HashSet::new();

        for component in algo::tarjan_scc(digraph) {
            match component.as_slice() {
                [single] => {
                    if digraph.contains_edge(*single, *single) {
                        members.insert(*single);
                    }
                }
                _ => members.extend(component),
            }
        }

        digraph
            .node_indices()
            .filter(|n| members.contains(n))
            .map(|n| digraph[n].id.clone())
            .collect()
    }

    /// Whether adding `from -> to` (`from` depends on `to`) would close a cycle.
    ///
    /// Returns `false` when either row does not exist, since a dangling
    /// reference never becomes an edge.
    #[must_use]
    pub fn would_create_cycle(&self, from: &str, to: &str) -> bool {
        let (Some(from_node), Some(to_node)) = (self.index_of(from), self.index_of(to)) else {
            return false;
        };

        // A path from `to` back to `from` means the new edge closes a loop.
        from_node == to_node || algo::has_path_connecting(self.digraph(), to_node, from_node, None)
    }

    /// Whether the graph contains any cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        algo::is_cyclic_directed(self.digraph())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::rows;
    use super::*;

    fn ids(cycle: &[RowId]) -> Vec<&str> {
        cycle.iter().map(RowId::as_str).collect()
    }

    #[test]
    fn test_detects_three_cycle_with_closing_marker() {
        let graph = DependencyGraph::build(&rows(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]));

        let cycles = graph.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(ids(&cycles[0]), vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_detects_self_loop() {
        let graph = DependencyGraph::build(&rows(&[("a", &["a"])]));
        let cycles = graph.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(ids(&cycles[0]), vec!["a", "a"]);
    }

    #[test]
    fn test_detects_disjoint_cycles() {
        let graph = DependencyGraph::build(&rows(&[
            ("a", &["b"]),
            ("b", &["a"]),
            ("x", &["y"]),
            ("y", &["x"]),
            ("free", &["a"]),
        ]));

        let cycles = graph.detect_cycles();
        assert_eq!(cycles.len(), 2);
        assert_eq!(ids(&cycles[0]), vec!["a", "b", "a"]);
        assert_eq!(ids(&cycles[1]), vec!["x", "y", "x"]);
    }

    #[test]
    fn test_cycle_slice_excludes_tail_prefix() {
        // root -> a -> b -> a : the cycle does not include `root`
        let graph = DependencyGraph::build(&rows(&[("root", &["a"]), ("a", &["b"]), ("b", &["a"])]));
        let cycles = graph.detect_cycles();
        assert_eq!(ids(&cycles[0]), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_acyclic_graph_reports_nothing() {
        let graph = DependencyGraph::build(&rows(&[
            ("a", &[]),
            ("b", &["a", "missing"]),
            ("c", &["a", "b"]),
        ]));
        assert!(graph.detect_cycles().is_empty());
        assert!(graph.rows_in_cycles().is_empty());
        assert!(!graph.has_cycle());
    }

    #[test]
    fn test_rows_in_cycles_covers_overlapping_cycles() {
        let graph = DependencyGraph::build(&rows(&[
            ("a", &["b"]),
            ("b", &["c", "a"]),
            ("c", &["a"]),
            ("d", &["d"]),
            ("e", &["a"]),
        ]));

        let members: Vec<_> = graph.rows_in_cycles().iter().map(|id| id.to_string()).collect();
        assert_eq!(members, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_would_create_cycle() {
        let graph = DependencyGraph::build(&rows(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]));

        assert!(graph.would_create_cycle("a", "c"));
        assert!(graph.would_create_cycle("a", "a"));
        assert!(!graph.would_create_cycle("c", "a"));
        assert!(!graph.would_create_cycle("a", "ghost"));
    }
}
