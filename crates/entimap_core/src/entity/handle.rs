//! Shared entity handles.

use super::{InstanceId, PivotedCollection, RelationValue};
use entimap_driver::{Row, Value};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug)]
struct EntityBody {
    role: String,
    fields: Row,
    relations: BTreeMap<String, RelationValue>,
}

/// A handle to an in-memory entity.
///
/// Handles are cheap to clone; clones refer to the same instance. Equality
/// and hashing use the [`InstanceId`], never field values, so two handles
/// holding identical rows are still different entities.
///
/// # Example
///
/// ```rust
/// use entimap_core::EntityHandle;
///
/// let user = EntityHandle::new("user").with("email", "hello@world.com");
/// let post = EntityHandle::new("post").with("title", "first");
/// user.push("posts", post.clone());
///
/// assert_eq!(user.relation("posts").targets(), vec![post]);
/// ```
#[derive(Clone)]
pub struct EntityHandle {
    id: InstanceId,
    body: Arc<RwLock<EntityBody>>,
}

impl EntityHandle {
    /// Creates a new entity of the given role with no fields set.
    pub fn new(role: impl Into<String>) -> Self {
        Self::from_row(role, Row::new())
    }

    /// Creates a new entity with the given field values.
    pub fn from_row(role: impl Into<String>, fields: Row) -> Self {
        Self {
            id: InstanceId::new(),
            body: Arc::new(RwLock::new(EntityBody {
                role: role.into(),
                fields,
                relations: BTreeMap::new(),
            })),
        }
    }

    /// Sets a field and returns the handle.
    #[must_use]
    pub fn with(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Returns the instance id.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Returns the role.
    #[must_use]
    pub fn role(&self) -> String {
        self.body.read().role.clone()
    }

    /// Returns a field value, `Value::Null` if unset.
    #[must_use]
    pub fn get(&self, column: &str) -> Value {
        self.body
            .read()
            .fields
            .get(column)
            .cloned()
            .unwrap_or_default()
    }

    /// Sets a field value.
    pub fn set(&self, column: impl Into<String>, value: impl Into<Value>) {
        self.body.write().fields.insert(column.into(), value.into());
    }

    /// Returns a copy of all field values.
    #[must_use]
    pub fn fields(&self) -> Row {
        self.body.read().fields.clone()
    }

    /// Returns a relation value, `Unloaded` if never set.
    #[must_use]
    pub fn relation(&self, name: &str) -> RelationValue {
        self.body
            .read()
            .relations
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Replaces a relation value.
    pub fn set_relation(&self, name: impl Into<String>, value: RelationValue) {
        self.body.write().relations.insert(name.into(), value);
    }

    /// Sets a to-one relation.
    pub fn set_one(&self, name: impl Into<String>, target: Option<EntityHandle>) {
        self.set_relation(name, RelationValue::One(target));
    }

    /// Appends to a to-many relation, loading it if it was unloaded.
    pub fn push(&self, name: &str, target: EntityHandle) {
        let mut body = self.body.write();
        let value = body
            .relations
            .entry(name.to_string())
            .or_insert_with(|| RelationValue::Many(Vec::new()));
        match value {
            RelationValue::Many(items) => {
                if !items.contains(&target) {
                    items.push(target);
                }
            }
            RelationValue::Pivoted(collection) => collection.link(target),
            other => *other = RelationValue::Many(vec![target]),
        }
    }

    /// Removes an entity from a to-many or many-to-many relation.
    ///
    /// Returns whether it was present.
    pub fn remove(&self, name: &str, target: &EntityHandle) -> bool {
        let mut body = self.body.write();
        match body.relations.get_mut(name) {
            Some(RelationValue::Many(items)) => {
                let before = items.len();
                items.retain(|e| e != target);
                before != items.len()
            }
            Some(RelationValue::Pivoted(collection)) => collection.unlink(target),
            Some(RelationValue::One(current)) if current.as_ref() == Some(target) => {
                *current = None;
                true
            }
            _ => false,
        }
    }

    /// Links a many-to-many target, optionally with a pivot entity.
    pub fn link(&self, name: &str, target: EntityHandle, pivot: Option<EntityHandle>) {
        let mut body = self.body.write();
        let value = body
            .relations
            .entry(name.to_string())
            .or_insert_with(|| RelationValue::Pivoted(PivotedCollection::new()));
        match value {
            RelationValue::Pivoted(collection) => collection.link_with(target, pivot),
            other => {
                let mut collection = PivotedCollection::new();
                for existing in other.targets() {
                    collection.link(existing);
                }
                collection.link_with(target, pivot);
                *other = RelationValue::Pivoted(collection);
            }
        }
    }

    /// Records a pivot created for a link during persistence.
    pub(crate) fn attach_pivot(&self, name: &str, target: &EntityHandle, pivot: EntityHandle) {
        if let Some(RelationValue::Pivoted(collection)) = self.body.write().relations.get_mut(name)
        {
            collection.attach(target, pivot);
        }
    }
}

impl PartialEq for EntityHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityHandle {}

impl Hash for EntityHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EntityHandle {
    // relations are omitted, they may be cyclic
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self.body.read();
        f.debug_struct("EntityHandle")
            .field("id", &self.id)
            .field("role", &body.role)
            .field("fields", &body.fields)
            .finish_non_exhaustive()
    }
}
