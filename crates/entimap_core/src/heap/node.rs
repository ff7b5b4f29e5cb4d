//! Entity state records.

use crate::entity::EntityHandle;
use entimap_driver::{Row, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Lifecycle status of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    /// Not yet persisted.
    New,
    /// Persisted; `data` holds the last written row.
    Managed,
    /// A delete is being executed in the current run.
    ScheduledDelete,
    /// Deleted by a committed run.
    Deleted,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeStatus::New => "new",
            NodeStatus::Managed => "managed",
            NodeStatus::ScheduledDelete => "scheduled delete",
            NodeStatus::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Related instances last persisted through a relation.
#[derive(Debug, Clone)]
pub enum RelationSnapshot {
    /// Targets of a to-one or to-many relation.
    Targets(Vec<EntityHandle>),
    /// Targets of a many-to-many relation with the pivot of each link.
    Pivoted(Vec<(EntityHandle, EntityHandle)>),
}

impl RelationSnapshot {
    /// Returns the persisted targets.
    #[must_use]
    pub fn targets(&self) -> Vec<EntityHandle> {
        match self {
            RelationSnapshot::Targets(items) => items.clone(),
            RelationSnapshot::Pivoted(links) => links.iter().map(|(t, _)| t.clone()).collect(),
        }
    }

    /// Returns the pivot recorded for a target.
    #[must_use]
    pub fn pivot_of(&self, target: &EntityHandle) -> Option<EntityHandle> {
        match self {
            RelationSnapshot::Targets(_) => None,
            RelationSnapshot::Pivoted(links) => links
                .iter()
                .find(|(t, _)| t == target)
                .map(|(_, p)| p.clone()),
        }
    }
}

/// The state record of one tracked entity.
///
/// Invariant: a `Managed` node has a non-null primary key in `data`.
#[derive(Debug, Clone)]
pub struct Node {
    /// Lifecycle status.
    pub status: NodeStatus,
    /// Role of the entity.
    pub role: String,
    /// Last persisted column values.
    pub data: Row,
    /// Last persisted relation contents, by relation name.
    pub relations: BTreeMap<String, RelationSnapshot>,
}

impl Node {
    /// Creates a record for an entity that was never persisted.
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            status: NodeStatus::New,
            role: role.into(),
            data: Row::new(),
            relations: BTreeMap::new(),
        }
    }

    /// Creates a record for a row loaded from the database.
    pub fn managed(role: impl Into<String>, data: Row) -> Self {
        Self {
            status: NodeStatus::Managed,
            role: role.into(),
            data,
            relations: BTreeMap::new(),
        }
    }

    /// Returns the persisted value of a column, `Null` if unknown.
    #[must_use]
    pub fn value(&self, column: &str) -> Value {
        self.data.get(column).cloned().unwrap_or_default()
    }

    /// Returns whether a row exists for this record.
    #[must_use]
    pub fn is_persisted(&self, primary_key: &str) -> bool {
        matches!(
            self.status,
            NodeStatus::Managed | NodeStatus::ScheduledDelete
        ) && !self.value(primary_key).is_null()
    }

    /// Returns the columns of `current` that differ from the persisted data.
    #[must_use]
    pub fn changed_fields(&self, current: &Row) -> BTreeSet<String> {
        current
            .iter()
            .filter(|(column, value)| self.data.get(*column).unwrap_or(&Value::Null) != *value)
            .map(|(column, _)| column.clone())
            .collect()
    }

    /// Returns the changed columns of `current` with their new values.
    #[must_use]
    pub fn diff(&self, current: &Row) -> Row {
        current
            .iter()
            .filter(|(column, value)| self.data.get(*column).unwrap_or(&Value::Null) != *value)
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn value_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<i64>().prop_map(Value::Integer),
            "[a-z]{0,8}".prop_map(Value::Text),
        ]
    }

    fn row_strategy() -> impl Strategy<Value = Row> {
        prop::collection::btree_map("[a-e]", value_strategy(), 0..5)
    }

    proptest! {
        #[test]
        fn applied_diff_leaves_nothing_changed(persisted in row_strategy(), current in row_strategy()) {
            let mut node = Node::managed("user", persisted);
            let diff = node.diff(&current);
            prop_assert_eq!(
                diff.keys().cloned().collect::<BTreeSet<_>>(),
                node.changed_fields(&current)
            );

            node.data.extend(diff);
            prop_assert!(node.diff(&current).is_empty());
        }
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn changed_fields_ignores_equal_values() {
        let node = Node::managed("user", row(&[("id", 1.into()), ("email", "a".into())]));
        let current = row(&[("id", 1.into()), ("email", "b".into())]);
        let changed = node.changed_fields(&current);
        assert_eq!(changed.into_iter().collect::<Vec<_>>(), vec!["email"]);
    }

    #[test]
    fn missing_persisted_column_counts_as_null() {
        let node = Node::managed("user", row(&[("id", 1.into())]));
        let current = row(&[("id", 1.into()), ("name", Value::Null), ("age", 3.into())]);
        assert_eq!(node.diff(&current), row(&[("age", 3.into())]));
    }

    #[test]
    fn persisted_requires_key() {
        let node = Node::new("user");
        assert!(!node.is_persisted("id"));

        let node = Node::managed("user", row(&[("id", 1.into())]));
        assert!(node.is_persisted("id"));

        let mut deleted = node.clone();
        deleted.status = NodeStatus::Deleted;
        assert!(!deleted.is_persisted("id"));
    }

    #[test]
    fn snapshot_pivot_lookup() {
        let tag = EntityHandle::new("tag");
        let pivot = EntityHandle::new("tag_user_map");
        let snapshot = RelationSnapshot::Pivoted(vec![(tag.clone(), pivot.clone())]);
        assert_eq!(snapshot.pivot_of(&tag), Some(pivot));
        assert_eq!(snapshot.targets(), vec![tag]);
    }
}
