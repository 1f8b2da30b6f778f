//! Reverse dependency edges plus root/leaf bookkeeping.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// `edges[dependency]` is the set of tools that depend on it.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: IndexMap<String, IndexSet<String>>,
    root_nodes: IndexSet<String>,
    leaf_nodes: IndexSet<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dependent` depends on every tool in `dependencies`.
    pub fn add_edges<'a>(&mut self, dependent: &str, dependencies: impl IntoIterator<Item = &'a str>) {
        for dependency in dependencies {
            self.edges
                .entry(dependency.to_owned())
                .or_default()
                .insert(dependent.to_owned());
        }
    }

    /// Forget the edges `dependent` contributed.
    pub fn remove_edges<'a>(
        &mut self,
        dependent: &str,
        dependencies: impl IntoIterator<Item = &'a str>,
    ) {
        for dependency in dependencies {
            if let Some(set) = self.edges.get_mut(dependency) {
                set.shift_remove(dependent);
                if set.is_empty() {
                    self.edges.shift_remove(dependency);
                }
            }
        }
    }

    pub fn dependents_of(&self, tool_name: &str) -> Vec<String> {
        self.edges
            .get(tool_name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Rebuild root and leaf sets from the registered tools.
    ///
    /// Roots declare no dependency groups; leaves have no recorded dependents.
    pub fn recompute<'a>(&mut self, tools: impl IntoIterator<Item = (&'a str, bool)>) {
        self.root_nodes.clear();
        self.leaf_nodes.clear();
        for (name, has_dependencies) in tools {
            if !has_dependencies {
                self.root_nodes.insert(name.to_owned());
            }
            if self.edges.get(name).is_none_or(IndexSet::is_empty) {
                self.leaf_nodes.insert(name.to_owned());
            }
        }
    }

    pub fn root_nodes(&self) -> impl Iterator<Item = &str> {
        self.root_nodes.iter().map(String::as_str)
    }

    pub fn leaf_nodes(&self) -> impl Iterator<Item = &str> {
        self.leaf_nodes.iter().map(String::as_str)
    }

    pub fn is_root(&self, tool_name: &str) -> bool {
        self.root_nodes.contains(tool_name)
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().flat_map(|(dependency, dependents)| {
            dependents
                .iter()
                .map(move |dependent| (dependency.as_str(), dependent.as_str()))
        })
    }

    /// Depth-first search from the roots along dependency edges.
    ///
    /// Returns the first path found, which is not necessarily the shortest.
    pub fn find_path(&self, target: &str) -> Option<Vec<String>> {
        for root in &self.root_nodes {
            let mut visited = IndexSet::new();
            let mut path = Vec::new();
            if self.walk(root, target, &mut visited, &mut path) {
                return Some(path);
            }
        }
        None
    }

    fn walk(
        &self,
        node: &str,
        target: &str,
        visited: &mut IndexSet<String>,
        path: &mut Vec<String>,
    ) -> bool {
        if !visited.insert(node.to_owned()) {
            return false;
        }
        path.push(node.to_owned());
        if node == target {
            return true;
        }
        if let Some(dependents) = self.edges.get(node) {
            for next in dependents {
                if self.walk(next, target, visited, path) {
                    return true;
                }
            }
        }
        path.pop();
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub name: String,
    pub available: bool,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// The dependency.
    pub from: String,
    /// The tool that depends on `from`.
    pub to: String,
}

/// Serializable diagnostic view of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DependencyGraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub root_nodes: Vec<String>,
    pub leaf_nodes: Vec<String>,
}
