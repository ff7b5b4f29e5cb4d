//! Relation definitions.

use std::fmt;

/// Kind of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Owner key is copied into one child's outer key.
    HasOne,
    /// Owner key is copied into each child's outer key.
    HasMany,
    /// Parent key is copied into the owner's inner key.
    BelongsTo,
    /// Like `BelongsTo`, but tolerates reference cycles by writing the key
    /// in a follow-up update.
    RefersTo,
    /// Association through a pivot entity holding both keys.
    ManyToMany,
    /// `HasOne` with the owner role written into the child's morph key.
    MorphedHasOne,
    /// `HasMany` with the owner role written into each child's morph key.
    MorphedHasMany,
    /// `BelongsTo` whose target role is read from the owner's morph key.
    BelongsToMorphed,
}

impl RelationKind {
    /// Returns whether the relation writes a discriminator column.
    #[must_use]
    pub const fn is_morphed(self) -> bool {
        matches!(
            self,
            RelationKind::MorphedHasOne
                | RelationKind::MorphedHasMany
                | RelationKind::BelongsToMorphed
        )
    }

    /// Returns whether the owner's row must be written before the related
    /// rows, i.e. the related rows carry the owner's key.
    #[must_use]
    pub const fn is_parent_side(self) -> bool {
        matches!(
            self,
            RelationKind::HasOne
                | RelationKind::HasMany
                | RelationKind::MorphedHasOne
                | RelationKind::MorphedHasMany
        )
    }

    /// Returns whether the related row must exist before the owner's row.
    #[must_use]
    pub const fn is_dependency(self) -> bool {
        matches!(
            self,
            RelationKind::BelongsTo | RelationKind::BelongsToMorphed
        )
    }

    /// Returns whether the relation needs a pivot entity.
    #[must_use]
    pub const fn needs_pivot(self) -> bool {
        matches!(self, RelationKind::ManyToMany)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelationKind::HasOne => "has one",
            RelationKind::HasMany => "has many",
            RelationKind::BelongsTo => "belongs to",
            RelationKind::RefersTo => "refers to",
            RelationKind::ManyToMany => "many to many",
            RelationKind::MorphedHasOne => "morphed has one",
            RelationKind::MorphedHasMany => "morphed has many",
            RelationKind::BelongsToMorphed => "belongs to morphed",
        };
        f.write_str(name)
    }
}

/// Pivot definition of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThroughSchema {
    /// Role of the pivot entity.
    pub role: String,
    /// Pivot column holding the owner's key.
    pub inner_key: String,
    /// Pivot column holding the target's key.
    pub outer_key: String,
}

/// Definition of one relation of an entity.
///
/// Key naming follows the owner's point of view: `inner_key` is a column
/// of the owner's table, `outer_key` a column of the target's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSchema {
    /// Relation name, as used on [`EntityHandle`](crate::EntityHandle).
    pub name: String,
    /// Relation kind.
    pub kind: RelationKind,
    /// Target role. Ignored by `BelongsToMorphed`.
    pub target: String,
    /// Whether related entities are written and deleted with the owner.
    pub cascade: bool,
    /// Whether the foreign key may be NULL.
    pub nullable: bool,
    /// Key column on the owner's side.
    pub inner_key: String,
    /// Key column on the target's side.
    pub outer_key: String,
    /// Discriminator column of morphed relations.
    pub morph_key: Option<String>,
    /// Pivot definition of many-to-many relations.
    pub through: Option<ThroughSchema>,
}

impl RelationSchema {
    /// Creates a relation with cascade on and nullable off.
    pub fn new(
        name: impl Into<String>,
        kind: RelationKind,
        target: impl Into<String>,
        inner_key: impl Into<String>,
        outer_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            cascade: true,
            nullable: false,
            inner_key: inner_key.into(),
            outer_key: outer_key.into(),
            morph_key: None,
            through: None,
        }
    }

    /// Creates a `HasOne` relation.
    pub fn has_one(
        name: impl Into<String>,
        target: impl Into<String>,
        inner_key: impl Into<String>,
        outer_key: impl Into<String>,
    ) -> Self {
        Self::new(name, RelationKind::HasOne, target, inner_key, outer_key)
    }

    /// Creates a `HasMany` relation.
    pub fn has_many(
        name: impl Into<String>,
        target: impl Into<String>,
        inner_key: impl Into<String>,
        outer_key: impl Into<String>,
    ) -> Self {
        Self::new(name, RelationKind::HasMany, target, inner_key, outer_key)
    }

    /// Creates a `BelongsTo` relation.
    pub fn belongs_to(
        name: impl Into<String>,
        target: impl Into<String>,
        inner_key: impl Into<String>,
        outer_key: impl Into<String>,
    ) -> Self {
        Self::new(name, RelationKind::BelongsTo, target, inner_key, outer_key)
    }

    /// Creates a `RefersTo` relation. Refers-to keys are nullable.
    pub fn refers_to(
        name: impl Into<String>,
        target: impl Into<String>,
        inner_key: impl Into<String>,
        outer_key: impl Into<String>,
    ) -> Self {
        Self::new(name, RelationKind::RefersTo, target, inner_key, outer_key).nullable(true)
    }

    /// Creates a `ManyToMany` relation through a pivot role.
    pub fn many_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        inner_key: impl Into<String>,
        outer_key: impl Into<String>,
        through: ThroughSchema,
    ) -> Self {
        let mut relation = Self::new(name, RelationKind::ManyToMany, target, inner_key, outer_key);
        relation.through = Some(through);
        relation
    }

    /// Sets the cascade flag.
    #[must_use]
    pub fn cascade(mut self, value: bool) -> Self {
        self.cascade = value;
        self
    }

    /// Sets the nullable flag.
    #[must_use]
    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Sets the discriminator column.
    #[must_use]
    pub fn morph_key(mut self, column: impl Into<String>) -> Self {
        self.morph_key = Some(column.into());
        self
    }
}

impl ThroughSchema {
    /// Creates a pivot definition.
    pub fn new(
        role: impl Into<String>,
        inner_key: impl Into<String>,
        outer_key: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            inner_key: inner_key.into(),
            outer_key: outer_key.into(),
        }
    }
}
