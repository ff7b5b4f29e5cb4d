//! Traversal cycle guard.

use crate::entity::InstanceId;
use std::collections::HashSet;

/// Set of `(entity, relation)` edges already descended in one run.
///
/// A fresh set is created for every run and passed by reference through
/// the graph traversal.
#[derive(Debug, Default)]
pub struct Visited {
    edges: HashSet<(InstanceId, String)>,
}

impl Visited {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the edge was already descended.
    #[must_use]
    pub fn visited(&self, entity: InstanceId, relation: &str) -> bool {
        self.edges.contains(&(entity, relation.to_string()))
    }

    /// Marks an edge. Returns `false` if it was already marked.
    pub fn mark_visited(&mut self, entity: InstanceId, relation: &str) -> bool {
        self.edges.insert((entity, relation.to_string()))
    }

    /// Returns the number of marked edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns whether no edge is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
