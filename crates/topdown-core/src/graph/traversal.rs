//! Ordering, impact and depth queries.

use super::DependencyGraph;
use crate::domain::RowId;
use petgraph::graph::NodeIndex;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

/// Result of [`DependencyGraph::topological_sort`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologicalOrder {
    /// Ids with every dependency before its dependents
    pub order: Vec<RowId>,
    /// True iff some nodes could not be ordered because of a cycle
    pub has_cycle: bool,
}

impl DependencyGraph {
    /// Order nodes so that dependencies come before dependents (Kahn's algorithm).
    ///
    /// In-degrees count only references that resolve to a node. Zero
    /// in-degree nodes are released in discovery order (FIFO). Nodes on or
    /// behind a cycle never reach zero in-degree, so `has_cycle` is set
    /// exactly when the output is shorter than the node count.
    #[must_use]
    pub fn topological_sort(&self) -> TopologicalOrder {
        let digraph = self.digraph();
        let mut in_degree: HashMap<NodeIndex, usize> = digraph
            .node_indices()
            .map(|n| (n, self.resolved_depends(n).count()))
            .collect();

        let mut queue: VecDeque<NodeIndex> = digraph
            .node_indices()
            .filter(|n| in_degree[n] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(node) = queue.pop_front() {
            order.push(digraph[node].id.clone());
            for dependent in self.resolved_dependents(node) {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        let has_cycle = order.len() < self.len();
        TopologicalOrder { order, has_cycle }
    }

    /// Every row that transitively depends on `id`, excluding `id` itself.
    ///
    /// Breadth-first over `dependents`, each row listed once in discovery
    /// order. Unknown ids have no dependents.
    #[must_use]
    pub fn affected_downstream(&self, id: &str) -> Vec<RowId> {
        self.impact_levels(id).into_iter().flatten().collect()
    }

    /// Impact grouped by distance from `id`.
    ///
    /// Level 0 holds the direct dependents, level 1 the rows reached through
    /// them, and so on. Expansion stops at the first round that finds no new row.
    #[must_use]
    pub fn impact_levels(&self, id: &str) -> Vec<Vec<RowId>> {
        let Some(start) = self.index_of(id) else {
            return Vec::new();
        };

        let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
        let mut frontier = vec![start];
        let mut levels = Vec::new();

        loop {
            let mut next = Vec::new();
            for &node in &frontier {
                for dependent in self.resolved_dependents(node) {
                    if visited.insert(dependent) {
                        next.push(dependent);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            levels.push(
                next.iter()
                    .map(|&n| self.digraph()[n].id.clone())
                    .collect(),
            );
            frontier = next;
        }

        levels
    }

    /// Every existing row `id` depends on, directly or transitively, in BFS order.
    #[must_use]
    pub fn transitive_dependencies(&self, id: &str) -> Vec<RowId> {
        let Some(start) = self.index_of(id) else {
            return Vec::new();
        };

        let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut result = Vec::new();

        while let Some(node) = queue.pop_front() {
            for dep in self.resolved_depends(node) {
                if visited.insert(dep) {
                    result.push(self.digraph()[dep].id.clone());
                    queue.push_back(dep);
                }
            }
        }

        result
    }

    /// Depth of every node: 0 without dependencies, else one more than the
    /// deepest dependency.
    ///
    /// Missing dependencies count as depth 0. A node reached again while its
    /// own depth is being evaluated (a cycle) contributes 0 at that point.
    #[must_use]
    pub fn node_depths(&self) -> HashMap<RowId, usize> {
        let mut memo: HashMap<NodeIndex, usize> = HashMap::with_capacity(self.len());
        let mut in_progress: HashSet<NodeIndex> = HashSet::new();

        for node in self.digraph().node_indices() {
            self.depth_of(node, &mut memo, &mut in_progress);
        }

        memo.into_iter()
            .map(|(n, depth)| (self.digraph()[n].id.clone(), depth))
            .collect()
    }

    /// Maximum node depth, 0 for an empty graph.
    #[must_use]
    pub fn compute_max_depth(&self) -> usize {
        self.node_depths().into_values().max().unwrap_or(0)
    }

    fn depth_of(
        &self,
        node: NodeIndex,
        memo: &mut HashMap<NodeIndex, usize>,
        in_progress: &mut HashSet<NodeIndex>,
    ) -> usize {
        if let Some(&depth) = memo.get(&node) {
            return depth;
        }
        if !in_progress.insert(node) {
            return 0;
        }

        let declared = &self.digraph()[node].depends;
        let depth = if declared.is_empty() {
            0
        } else {
            let deps: Vec<NodeIndex> = self.resolved_depends(node).collect();
            1 + deps
                .into_iter()
                .map(|dep| self.depth_of(dep, memo, in_progress))
                .max()
                .unwrap_or(0)
        };

        in_progress.remove(&node);
        memo.insert(node, depth);
        depth
    }
}
