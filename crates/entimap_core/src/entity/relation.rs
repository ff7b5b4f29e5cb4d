//! Relation values held by entities.

use super::EntityHandle;

/// One element of a many-to-many collection.
#[derive(Debug, Clone)]
pub struct PivotedEntry {
    /// The related entity.
    pub target: EntityHandle,
    /// The pivot entity carrying the association row, if known.
    pub pivot: Option<EntityHandle>,
}

/// A many-to-many collection whose elements may carry pivot entities.
#[derive(Debug, Clone, Default)]
pub struct PivotedCollection {
    entries: Vec<PivotedEntry>,
}

impl PivotedCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a target without a pivot. A pivot is created when persisted.
    pub fn link(&mut self, target: EntityHandle) {
        self.link_with(target, None);
    }

    /// Adds a target with an explicit pivot entity.
    ///
    /// Linking an already linked target replaces its pivot if one is given.
    pub fn link_with(&mut self, target: EntityHandle, pivot: Option<EntityHandle>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.target == target) {
            if pivot.is_some() {
                entry.pivot = pivot;
            }
            return;
        }
        self.entries.push(PivotedEntry { target, pivot });
    }

    /// Removes a target. Returns whether it was linked.
    pub fn unlink(&mut self, target: &EntityHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.target != *target);
        before != self.entries.len()
    }

    /// Returns the pivot of a linked target.
    #[must_use]
    pub fn pivot_of(&self, target: &EntityHandle) -> Option<EntityHandle> {
        self.entries
            .iter()
            .find(|e| e.target == *target)
            .and_then(|e| e.pivot.clone())
    }

    /// Sets the pivot of a linked target if it has none.
    pub(crate) fn attach(&mut self, target: &EntityHandle, pivot: EntityHandle) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.target == *target) {
            entry.pivot.get_or_insert(pivot);
        }
    }

    /// Returns the entries in link order.
    #[must_use]
    pub fn entries(&self) -> &[PivotedEntry] {
        &self.entries
    }

    /// Returns the linked targets.
    #[must_use]
    pub fn targets(&self) -> Vec<EntityHandle> {
        self.entries.iter().map(|e| e.target.clone()).collect()
    }

    /// Returns the number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The in-memory value of a relation.
#[derive(Debug, Clone, Default)]
pub enum RelationValue {
    /// Never loaded or assigned; persistence leaves the relation alone.
    #[default]
    Unloaded,
    /// A to-one relation, possibly empty.
    One(Option<EntityHandle>),
    /// A to-many relation.
    Many(Vec<EntityHandle>),
    /// A many-to-many relation with pivot entities.
    Pivoted(PivotedCollection),
}

impl RelationValue {
    /// Returns whether the relation holds a value persistence should honor.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        !matches!(self, RelationValue::Unloaded)
    }

    /// Returns the related entities.
    #[must_use]
    pub fn targets(&self) -> Vec<EntityHandle> {
        match self {
            RelationValue::Unloaded | RelationValue::One(None) => Vec::new(),
            RelationValue::One(Some(e)) => vec![e.clone()],
            RelationValue::Many(items) => items.clone(),
            RelationValue::Pivoted(collection) => collection.targets(),
        }
    }

    /// Returns the related entities paired with their pivots.
    #[must_use]
    pub fn pivoted_entries(&self) -> Vec<PivotedEntry> {
        match self {
            RelationValue::Pivoted(collection) => collection.entries().to_vec(),
            other => other
                .targets()
                .into_iter()
                .map(|target| PivotedEntry {
                    target,
                    pivot: None,
                })
                .collect(),
        }
    }

    /// Returns the single related entity of a to-one relation.
    #[must_use]
    pub fn one(&self) -> Option<EntityHandle> {
        match self {
            RelationValue::One(e) => e.clone(),
            RelationValue::Many(items) => items.first().cloned(),
            _ => None,
        }
    }
}
