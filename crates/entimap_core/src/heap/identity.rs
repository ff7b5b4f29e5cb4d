//! The identity map.

use super::Node;
use crate::entity::{EntityHandle, InstanceId};
use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;

/// Registry of tracked entities and their state records.
///
/// The heap is keyed by instance identity, not by primary key: two handles
/// loaded for the same row are tracked independently. Keeping one handle
/// per row is the caller's responsibility.
///
/// Records are mutated only by a unit of work run (completion and
/// rollback). The read path registers entities through
/// [`Orm::hydrate`](crate::Orm::hydrate).
#[derive(Debug, Default)]
pub struct Heap {
    nodes: HashMap<InstanceId, (EntityHandle, Node)>,
}

impl Heap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record of an entity.
    #[must_use]
    pub fn get(&self, entity: &EntityHandle) -> Option<&Node> {
        self.nodes.get(&entity.id()).map(|(_, node)| node)
    }

    /// Returns the record of an entity mutably.
    pub fn get_mut(&mut self, entity: &EntityHandle) -> Option<&mut Node> {
        self.nodes.get_mut(&entity.id()).map(|(_, node)| node)
    }

    /// Registers an entity.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRegistration` if the instance is already tracked.
    pub fn put(&mut self, entity: EntityHandle, node: Node) -> CoreResult<()> {
        let id = entity.id();
        if self.nodes.contains_key(&id) {
            return Err(CoreError::DuplicateRegistration {
                instance: id,
                role: node.role,
            });
        }
        self.nodes.insert(id, (entity, node));
        Ok(())
    }

    /// Detaches an entity, returning its record.
    pub fn remove(&mut self, entity: &EntityHandle) -> Option<Node> {
        self.nodes.remove(&entity.id()).map(|(_, node)| node)
    }

    /// Returns whether an entity is tracked.
    #[must_use]
    pub fn contains(&self, entity: &EntityHandle) -> bool {
        self.nodes.contains_key(&entity.id())
    }

    /// Returns the tracked handle for an instance id.
    #[must_use]
    pub fn entity(&self, id: InstanceId) -> Option<&EntityHandle> {
        self.nodes.get(&id).map(|(entity, _)| entity)
    }

    /// Iterates over tracked entities and their records.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityHandle, &Node)> {
        self.nodes.values().map(|(entity, node)| (entity, node))
    }

    /// Removes every record matching the predicate; returns how many.
    pub fn evict_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Node) -> bool,
    {
        let before = self.nodes.len();
        self.nodes.retain(|_, (_, node)| !predicate(node));
        before - self.nodes.len()
    }

    /// Returns the number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the heap is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
