//! Relation contributions to the command graph.
//!
//! Each [`RelationKind`] contributes differently when its owner is stored
//! or deleted. Dispatch is a closed `match` resolved from the schema while
//! the graph is built:
//!
//! | kind                      | on store                                  | on delete              |
//! |---------------------------|-------------------------------------------|------------------------|
//! | has one / has many        | owner key into children, orphans handled  | children first         |
//! | morphed has one / many    | same, plus owner role into the morph key  | children first         |
//! | belongs to (morphed)      | parent first, parent key into owner       | nothing                |
//! | refers to                 | key now, or a follow-up update            | nothing                |
//! | many to many              | one pivot per link, fed by both keys      | pivots first           |

mod dependency;
mod parent;
mod pivot;
mod refers;

use crate::entity::{EntityHandle, RelationValue};
use crate::error::CoreResult;
use crate::heap::Visited;
use crate::schema::{EntitySchema, RelationKind, RelationSchema};
use crate::transaction::builder::GraphBuilder;
use crate::types::CommandId;

/// Contributes the commands of one relation while its owner is stored.
pub(crate) fn store(
    builder: &mut GraphBuilder<'_>,
    visited: &mut Visited,
    owner: &EntityHandle,
    schema: &EntitySchema,
    relation: &RelationSchema,
    value: &RelationValue,
) -> CoreResult<CommandId> {
    match relation.kind {
        RelationKind::HasOne
        | RelationKind::HasMany
        | RelationKind::MorphedHasOne
        | RelationKind::MorphedHasMany => parent::store(builder, visited, owner, relation, value),
        RelationKind::BelongsTo | RelationKind::BelongsToMorphed => {
            dependency::store(builder, visited, owner, relation, value)
        }
        RelationKind::RefersTo => refers::store(builder, visited, owner, schema, relation, value),
        RelationKind::ManyToMany => pivot::store(builder, visited, owner, relation, value),
    }
}

/// Contributes the commands of one relation while its owner is deleted.
///
/// The returned command runs before the owner's delete.
pub(crate) fn delete(
    builder: &mut GraphBuilder<'_>,
    visited: &mut Visited,
    owner: &EntityHandle,
    relation: &RelationSchema,
) -> CoreResult<CommandId> {
    match relation.kind {
        RelationKind::HasOne
        | RelationKind::HasMany
        | RelationKind::MorphedHasOne
        | RelationKind::MorphedHasMany => parent::delete(builder, visited, owner, relation),
        RelationKind::ManyToMany => pivot::delete(builder, visited, owner, relation),
        RelationKind::BelongsTo | RelationKind::BelongsToMorphed | RelationKind::RefersTo => {
            Ok(builder.nil())
        }
    }
}
