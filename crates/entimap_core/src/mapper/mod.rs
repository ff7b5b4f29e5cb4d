//! Mappers turn entity state into commands.

mod default;
mod timestamped;

pub use default::DefaultMapper;
pub use timestamped::TimestampedMapper;

use crate::command::Command;
use crate::entity::EntityHandle;
use crate::error::CoreResult;
use crate::heap::Node;
use crate::schema::EntitySchema;
use entimap_driver::Row;
use std::collections::HashMap;
use std::sync::Arc;

/// Converts one entity into table commands.
///
/// Mappers are pure with respect to the graph: they return a command and
/// never touch the driver or the identity map. They return
/// `Command::Atomic` or `Command::Nil`; composites are assembled by the
/// unit of work.
pub trait Mapper: Send + Sync {
    /// Returns the current column values of an entity.
    ///
    /// The default reads every mapped column, `Null` for unset ones.
    fn extract(&self, schema: &EntitySchema, entity: &EntityHandle) -> Row {
        let fields = entity.fields();
        schema
            .columns
            .iter()
            .map(|column| {
                let value = fields.get(column).cloned().unwrap_or_default();
                (column.clone(), value)
            })
            .collect()
    }

    /// Builds the insert or update of an entity.
    ///
    /// `current` holds the values to write; `diff` the columns that differ
    /// from the state record.
    ///
    /// # Errors
    ///
    /// Implementations may reject entities they cannot map.
    fn build_command(
        &self,
        schema: &EntitySchema,
        node: &Node,
        current: &Row,
        diff: &Row,
    ) -> CoreResult<Command>;

    /// Builds the delete of an entity.
    ///
    /// # Errors
    ///
    /// Implementations may reject entities they cannot map.
    fn build_delete_command(&self, schema: &EntitySchema, node: &Node) -> CoreResult<Command>;
}

/// Mappers by role, with a fallback for unregistered roles.
#[derive(Clone)]
pub struct MapperRegistry {
    mappers: HashMap<String, Arc<dyn Mapper>>,
    fallback: Arc<dyn Mapper>,
}

impl MapperRegistry {
    /// Creates a registry falling back to [`DefaultMapper`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_fallback(DefaultMapper)
    }

    /// Creates a registry with a custom fallback.
    pub fn with_fallback(fallback: impl Mapper + 'static) -> Self {
        Self {
            mappers: HashMap::new(),
            fallback: Arc::new(fallback),
        }
    }

    /// Registers the mapper of a role.
    pub fn register(&mut self, role: impl Into<String>, mapper: impl Mapper + 'static) {
        self.mappers.insert(role.into(), Arc::new(mapper));
    }

    /// Returns the mapper of a role.
    #[must_use]
    pub fn get(&self, role: &str) -> &dyn Mapper {
        self.mappers
            .get(role)
            .map_or(self.fallback.as_ref(), |mapper| mapper.as_ref())
    }

    /// Returns whether a role has its own mapper.
    #[must_use]
    pub fn has_custom(&self, role: &str) -> bool {
        self.mappers.contains_key(role)
    }
}

impl Default for MapperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut roles: Vec<&String> = self.mappers.keys().collect();
        roles.sort();
        f.debug_struct("MapperRegistry")
            .field("custom", &roles)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_reads_mapped_columns_only() {
        let schema = EntitySchema::new("user", "user", "id").columns(["email"]);
        let user = EntityHandle::new("user")
            .with("email", "a@b.c")
            .with("transient", 1);

        let row = DefaultMapper.extract(&schema, &user);
        assert_eq!(row.len(), 2);
        assert!(row["id"].is_null());
        assert_eq!(row["email"], "a@b.c".into());
    }

    #[test]
    fn registry_falls_back() {
        let mut registry = MapperRegistry::new();
        registry.register("post", TimestampedMapper::new());
        assert!(registry.has_custom("post"));
        assert!(!registry.has_custom("user"));
        // both resolve to a mapper
        let _ = registry.get("user");
        let _ = registry.get("post");
    }
}
