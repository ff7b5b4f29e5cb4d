//! Refers-to: a belongs-to that survives reference cycles.
//!
//! When the referenced key is already known it is written with the owner.
//! Otherwise the owner is written without it and a follow-up update, run
//! once the referenced row has a key, sets the column.

use crate::command::{AtomicCommand, Condition, Stream};
use crate::entity::{EntityHandle, RelationValue};
use crate::error::{CoreError, CoreResult};
use crate::heap::{RelationSnapshot, Visited};
use crate::schema::{EntitySchema, RelationSchema};
use crate::transaction::builder::{GraphBuilder, Source, Target};
use crate::types::CommandId;
use entimap_driver::{Row, Value};

pub(super) fn store(
    builder: &mut GraphBuilder<'_>,
    visited: &mut Visited,
    owner: &EntityHandle,
    schema: &EntitySchema,
    relation: &RelationSchema,
    value: &RelationValue,
) -> CoreResult<CommandId> {
    let Some(target) = value.one() else {
        if !relation.nullable {
            return Err(CoreError::missing_parent(owner.role(), &relation.name));
        }
        builder.forward(
            Source::Known(Value::Null),
            Target::Entity(owner.id()),
            &relation.inner_key,
            false,
            Stream::Data,
        );
        builder.record_snapshot(owner, &relation.name, RelationSnapshot::Targets(Vec::new()));
        return Ok(builder.nil());
    };
    builder.record_snapshot(
        owner,
        &relation.name,
        RelationSnapshot::Targets(vec![target.clone()]),
    );

    let stored = if relation.cascade {
        builder.queue_store(&target, visited)?
    } else {
        builder.nil()
    };

    let key = target.get(&relation.outer_key);
    if !builder.is_unsaved(&target) && !key.is_null() {
        builder.forward(
            Source::Known(key),
            Target::Entity(owner.id()),
            &relation.inner_key,
            false,
            Stream::Data,
        );
        return Ok(stored);
    }

    let update = AtomicCommand::update(&schema.table, &schema.primary_key, Row::new(), Row::new())
        .with_owner(owner.clone());
    let update = builder.push(update);
    builder.forward(
        Source::entity(owner, &schema.primary_key),
        Target::Command(update),
        &schema.primary_key,
        true,
        Stream::Scope,
    );
    builder.forward(
        Source::entity(&target, &relation.outer_key),
        Target::Command(update),
        &relation.inner_key,
        true,
        Stream::Data,
    );

    let deferred = match builder.slot_of(&target) {
        Some(slot) => builder.conditional(
            Condition::HasContext {
                command: slot,
                key: relation.outer_key.clone(),
            },
            update,
        ),
        None => update,
    };
    Ok(builder.sequence(vec![stored, deferred]))
}
