//! core::graph
//!
//! In-memory dependency graph of one rig.
//!
//! # Architecture
//!
//! The graph is built from a snapshot of a rig's issues:
//! - Nodes are issue ids
//! - Edges point from an issue to each entry in its `dependencies` list,
//!   regardless of type (parent-child edges count too)
//!
//! Edges to issues outside the snapshot (other rigs, deleted issues) are
//! kept; their targets simply have no outgoing edges.
//!
//! The live engine never loads a whole rig. It walks edges one routed
//! fetch at a time (see [`crate::federation`]). This snapshot form is what
//! the integrity check uses to look at a rig all at once.
//!
//! # Invariants
//!
//! - Graph must be acyclic

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::types::Issue;

/// Dependency graph snapshot.
///
/// Uses ordered collections so traversal, and therefore reported cycles,
/// are deterministic.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Outgoing edges for each issue
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from every dependency edge of `issues`.
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        let mut graph = Self::new();
        for issue in issues {
            graph.edges.entry(issue.id.clone()).or_default();
            for dep in &issue.dependencies {
                graph.add_edge(&issue.id, &dep.id);
            }
        }
        graph
    }

    /// Add an edge `from → to`.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    /// Outgoing edges of an issue.
    pub fn dependencies(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(id)
    }

    /// All issues with at least one recorded edge or an entry of their own.
    pub fn issues(&self) -> impl Iterator<Item = &String> {
        self.edges.keys()
    }

    /// Find a cycle.
    ///
    /// Returns the cycle as a path whose first and last elements are the
    /// same issue, e.g. `["a", "b", "c", "a"]`.
    ///
    /// # Example
    ///
    /// ```
    /// use rigwork::core::graph::DependencyGraph;
    ///
    /// let mut graph = DependencyGraph::new();
    /// graph.add_edge("a", "b");
    /// graph.add_edge("b", "a");
    ///
    /// assert_eq!(graph.find_cycle(), Some(vec!["a".into(), "b".into(), "a".into()]));
    /// ```
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();

        for id in self.edges.keys() {
            if let Some(cycle) = self.cycle_from(id, &mut visited, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn cycle_from<'a>(
        &'a self,
        id: &'a str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(pos) = path.iter().position(|p| *p == id) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(id.to_string());
            return Some(cycle);
        }
        if !visited.insert(id) {
            return None;
        }

        path.push(id);
        if let Some(targets) = self.edges.get(id) {
            for target in targets {
                if let Some(cycle) = self.cycle_from(target, visited, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }
}
