//! Name-keyed dependency graph with cycle detection and topological ordering.
//!
//! Shared by the compatibility check (service `depends_on` edges) and the
//! resource graph (resource `DependsOn` edges). Nodes are plain names; an edge
//! `from → to` means `from` depends on `to`.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashMap};

use crate::core::EcsgraphError;

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is on the DFS stack.
    Gray,
    /// Node and everything reachable from it has been visited.
    Black,
}

/// Directed graph of names.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    // BTreeMap keeps node insertion, and with it the DFS start order, stable
    node_map: BTreeMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if it doesn't exist yet.
    pub fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(name) {
            return index;
        }
        let index = self.graph.add_node(name.to_string());
        self.node_map.insert(name.to_string(), index);
        index
    }

    /// `from` depends on `to`.
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);
        if !self.graph.contains_edge(from_idx, to_idx) {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Fail with the first cycle found, rendered as `a → b → a`.
    pub fn detect_cycles(&self) -> Result<(), EcsgraphError> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|node| (node, Color::White)).collect();
        let mut path = Vec::new();

        for &node in self.node_map.values() {
            if matches!(colors.get(&node), Some(Color::White))
                && let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path)
            {
                return Err(EcsgraphError::CircularDependency {
                    chain: cycle.join(" → "),
                });
            }
        }
        Ok(())
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<String>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        let mut neighbors: Vec<_> = self.graph.neighbors(node).collect();
        neighbors.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));

        for neighbor in neighbors {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|n| *n == neighbor).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|n| self.graph[*n].clone()).collect();
                    cycle.push(self.graph[neighbor].clone());
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Names ordered so every dependency precedes its dependents.
    pub fn topological_order(&self) -> Result<Vec<String>, EcsgraphError> {
        self.detect_cycles()?;
        let indices = toposort(&self.graph, None).map_err(|cycle| EcsgraphError::CircularDependency {
            chain: self.graph[cycle.node_id()].clone(),
        })?;
        Ok(indices.into_iter().rev().map(|idx| self.graph[idx].clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topological_order_puts_dependencies_first() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("webService", "webTaskDefinition");
        graph.add_dependency("webTaskDefinition", "webTaskExecutionRole");
        graph.add_dependency("webService", "webTCP80Listener");

        let order = graph.topological_order().unwrap();
        let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(pos("webTaskExecutionRole") < pos("webTaskDefinition"));
        assert!(pos("webTaskDefinition") < pos("webService"));
        assert!(pos("webTCP80Listener") < pos("webService"));
    }

    #[test]
    fn test_cycle_chain() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "c");
        graph.add_dependency("c", "a");

        let err = graph.detect_cycles().unwrap_err();
        assert_eq!(
            err,
            EcsgraphError::CircularDependency {
                chain: "a → b → c → a".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_edges_are_ignored() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("a", "b");
        graph.ensure_node("c");
        assert_eq!(graph.node_count(), 3);
        assert!(graph.detect_cycles().is_ok());
    }
}
