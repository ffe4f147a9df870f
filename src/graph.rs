//! Dependency graph module.
//!
//! Provides [`DependencyGraph`], a directed graph of "must be resolved
//! before" relations. The engine uses it twice: to build token units after
//! their parents, and to find cyclic percent-of-another-stat references
//! inside one feature aggregate.

use crate::error::EngineError;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;

/// A directed graph where an edge `dependency -> dependent` means the
/// dependency must be resolved first.
///
/// # Examples
///
/// ```rust
/// use towerstat::graph::DependencyGraph;
///
/// let mut graph = DependencyGraph::new();
/// // a token (2) depends on its parent (1)
/// graph.add_edge(2_u32, 1_u32);
///
/// let order = graph.topological_sort().unwrap();
/// assert_eq!(order, vec![1, 2]);
/// ```
pub struct DependencyGraph<N> {
    graph: DiGraph<N, ()>,
    node_map: HashMap<N, NodeIndex>,
}

impl<N> DependencyGraph<N>
where
    N: Clone + Eq + Hash + Display,
{
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Add a node if it doesn't exist, returning its index.
    pub fn add_node(&mut self, node: N) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&node) {
            idx
        } else {
            let idx = self.graph.add_node(node.clone());
            self.node_map.insert(node, idx);
            idx
        }
    }

    /// Record that `from` depends on `to` (`to` is resolved first).
    pub fn add_edge(&mut self, from: N, to: N) {
        let from_idx = self.add_node(from);
        let to_idx = self.add_node(to);
        self.graph.add_edge(to_idx, from_idx, ());
    }

    /// Check if a node exists in the graph.
    pub fn contains_node(&self, node: &N) -> bool {
        self.node_map.contains_key(node)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Detect cycles, reporting the first one found as a closed path.
    pub fn detect_cycles(&self) -> Result<(), EngineError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for node_idx in self.graph.node_indices() {
            if !visited.contains(&node_idx) {
                let mut cycle_path = Vec::new();
                if let Some(cycle) =
                    self.dfs_cycle_detect(node_idx, &mut visited, &mut rec_stack, &mut cycle_path)
                {
                    return Err(cycle);
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle_detect(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        rec_stack: &mut HashSet<NodeIndex>,
        cycle_path: &mut Vec<NodeIndex>,
    ) -> Option<EngineError> {
        visited.insert(node);
        rec_stack.insert(node);
        cycle_path.push(node);

        for neighbor in self
            .graph
            .neighbors_directed(node, petgraph::Direction::Outgoing)
        {
            if !visited.contains(&neighbor) {
                if let Some(cycle) = self.dfs_cycle_detect(neighbor, visited, rec_stack, cycle_path)
                {
                    return Some(cycle);
                }
            } else if rec_stack.contains(&neighbor) {
                let start = cycle_path
                    .iter()
                    .position(|idx| *idx == neighbor)
                    .unwrap_or(0);
                let mut path: Vec<String> = cycle_path[start..]
                    .iter()
                    .map(|idx| self.graph[*idx].to_string())
                    .collect();
                path.push(self.graph[neighbor].to_string());
                return Some(EngineError::Cycle { path });
            }
        }

        rec_stack.remove(&node);
        cycle_path.pop();
        None
    }

    /// Resolution order, dependencies first.
    pub fn topological_sort(&self) -> Result<Vec<N>, EngineError> {
        self.detect_cycles()?;

        match toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .into_iter()
                .map(|idx| self.graph[idx].clone())
                .collect()),
            Err(cycle) => Err(EngineError::Cycle {
                path: vec![self.graph[cycle.node_id()].to_string()],
            }),
        }
    }

    /// Nodes that lie on a cycle, mapped to the index of their cycle.
    ///
    /// Two nodes share an index exactly when they are on a common cycle
    /// (same strongly connected component). A node with a self-loop gets an
    /// index of its own. Nodes on no cycle are absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use towerstat::graph::DependencyGraph;
    ///
    /// let mut graph = DependencyGraph::new();
    /// graph.add_edge("a", "b");
    /// graph.add_edge("b", "a");
    /// graph.add_edge("c", "d");
    /// graph.add_edge("d", "c");
    ///
    /// let cycles = graph.cycle_components();
    /// assert_eq!(cycles.get("a"), cycles.get("b"));
    /// assert_ne!(cycles.get("a"), cycles.get("c"));
    /// ```
    pub fn cycle_components(&self) -> HashMap<N, usize> {
        let mut nodes = HashMap::new();
        let cycles = tarjan_scc(&self.graph).into_iter().filter(|component| {
            component.len() > 1
                || component
                    .first()
                    .map(|idx| self.graph.contains_edge(*idx, *idx))
                    .unwrap_or(false)
        });
        for (index, component) in cycles.enumerate() {
            nodes.extend(
                component
                    .into_iter()
                    .map(|idx| (self.graph[idx].clone(), index)),
            );
        }
        nodes
    }

    /// Whether `a` and `b` lie on a common cycle (or `a == b` has a self-loop).
    pub fn on_same_cycle(components: &HashMap<N, usize>, a: &N, b: &N) -> bool {
        match (components.get(a), components.get(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl<N> Default for DependencyGraph<N>
where
    N: Clone + Eq + Hash + Display,
{
    fn default() -> Self {
        Self::new()
    }
}
