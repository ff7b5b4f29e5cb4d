//! Schema registry.

use super::{EntitySchema, RelationKind, RelationSchema};
use crate::error::{CoreError, CoreResult};
use std::collections::{BTreeMap, HashSet};

/// Registry of entity schemas by role.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: BTreeMap<String, EntitySchema>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity and returns the schema.
    #[must_use]
    pub fn with(mut self, entity: EntitySchema) -> Self {
        self.register(entity);
        self
    }

    /// Adds or replaces an entity.
    pub fn register(&mut self, entity: EntitySchema) {
        self.entities.insert(entity.role.clone(), entity);
    }

    /// Returns the schema of a role.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole` if the role is not registered.
    pub fn entity(&self, role: &str) -> CoreResult<&EntitySchema> {
        self.entities
            .get(role)
            .ok_or_else(|| CoreError::unknown_role(role))
    }

    /// Returns whether a role is registered.
    #[must_use]
    pub fn contains(&self, role: &str) -> bool {
        self.entities.contains_key(role)
    }

    /// Iterates over registered entities in role order.
    pub fn entities(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities.values()
    }

    /// Checks relation definitions against the registered entities.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` for the first inconsistency found:
    /// - duplicate relation names
    /// - unknown target or pivot roles
    /// - morphed relations without a morph key
    /// - many-to-many relations without a pivot
    /// - keys that are not columns of their table
    pub fn validate(&self) -> CoreResult<()> {
        for entity in self.entities.values() {
            let mut names = HashSet::new();
            for relation in &entity.relations {
                if !names.insert(relation.name.as_str()) {
                    return Err(CoreError::invalid_schema(
                        &entity.role,
                        format!("duplicate relation {}", relation.name),
                    ));
                }
                self.validate_relation(entity, relation)?;
            }
        }
        Ok(())
    }

    fn validate_relation(&self, owner: &EntitySchema, relation: &RelationSchema) -> CoreResult<()> {
        let fail = |message: String| {
            Err(CoreError::invalid_schema(
                &owner.role,
                format!("relation {}: {message}", relation.name),
            ))
        };

        if !owner.has_column(&relation.inner_key) {
            return fail(format!("unknown inner key {}", relation.inner_key));
        }

        if relation.kind.is_morphed() && relation.morph_key.is_none() {
            return fail("morphed relation without morph key".to_string());
        }

        // the target of a morphed belongs-to is only known at runtime
        if relation.kind == RelationKind::BelongsToMorphed {
            if let Some(morph_key) = &relation.morph_key {
                if !owner.has_column(morph_key) {
                    return fail(format!("unknown morph key {morph_key}"));
                }
            }
            return Ok(());
        }

        let Some(target) = self.entities.get(&relation.target) else {
            return fail(format!("unknown target role {}", relation.target));
        };
        if !target.has_column(&relation.outer_key) {
            return fail(format!("unknown outer key {}", relation.outer_key));
        }
        if let Some(morph_key) = &relation.morph_key {
            if !target.has_column(morph_key) {
                return fail(format!("unknown morph key {morph_key}"));
            }
        }

        if relation.kind.needs_pivot() {
            let Some(through) = &relation.through else {
                return fail("many-to-many relation without pivot".to_string());
            };
            let Some(pivot) = self.entities.get(&through.role) else {
                return fail(format!("unknown pivot role {}", through.role));
            };
            for key in [&through.inner_key, &through.outer_key] {
                if !pivot.has_column(key) {
                    return fail(format!("unknown pivot key {key}"));
                }
            }
        }

        Ok(())
    }
}
