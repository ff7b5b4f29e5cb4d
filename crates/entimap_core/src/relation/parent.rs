//! Has-one and has-many, plain and morphed.

use crate::command::Stream;
use crate::entity::{EntityHandle, RelationValue};
use crate::error::CoreResult;
use crate::heap::{RelationSnapshot, Visited};
use crate::schema::RelationSchema;
use crate::transaction::builder::{GraphBuilder, Source, Target};
use crate::types::CommandId;
use entimap_driver::Value;

pub(super) fn store(
    builder: &mut GraphBuilder<'_>,
    visited: &mut Visited,
    owner: &EntityHandle,
    relation: &RelationSchema,
    value: &RelationValue,
) -> CoreResult<CommandId> {
    let current = value.targets();
    let mut commands = Vec::new();

    // removed children are released before the current ones are written
    if let Some(snapshot) = builder.snapshot(owner, &relation.name) {
        for child in snapshot.targets() {
            if current.contains(&child) {
                continue;
            }
            if relation.nullable {
                commands.push(detach(builder, visited, &child, relation)?);
            } else {
                commands.push(builder.orphan(child));
            }
        }
    }

    for child in &current {
        if relation.cascade {
            commands.push(builder.queue_store(child, visited)?);
        }
        builder.forward(
            Source::entity(owner, &relation.inner_key),
            Target::Entity(child.id()),
            &relation.outer_key,
            true,
            Stream::Data,
        );
        if let Some(morph_key) = &relation.morph_key {
            builder.forward(
                Source::Known(Value::from(owner.role())),
                Target::Entity(child.id()),
                morph_key,
                true,
                Stream::Data,
            );
        }
    }

    builder.record_snapshot(owner, &relation.name, RelationSnapshot::Targets(current));
    Ok(builder.sequence(commands))
}

pub(super) fn delete(
    builder: &mut GraphBuilder<'_>,
    visited: &mut Visited,
    owner: &EntityHandle,
    relation: &RelationSchema,
) -> CoreResult<CommandId> {
    if !relation.cascade {
        return Ok(builder.nil());
    }

    let mut children = owner.relation(&relation.name).targets();
    if let Some(snapshot) = builder.snapshot(owner, &relation.name) {
        for child in snapshot.targets() {
            if !children.contains(&child) {
                children.push(child);
            }
        }
    }

    let mut commands = Vec::new();
    for child in &children {
        if !relation.nullable {
            commands.push(builder.queue_delete(child, visited)?);
        } else if !builder.is_unsaved(child) {
            commands.push(detach(builder, visited, child, relation)?);
        }
    }
    Ok(builder.sequence(commands))
}

/// Clears the foreign key (and morph key) of a child and stores it.
fn detach(
    builder: &mut GraphBuilder<'_>,
    visited: &mut Visited,
    child: &EntityHandle,
    relation: &RelationSchema,
) -> CoreResult<CommandId> {
    builder.forward(
        Source::Known(Value::Null),
        Target::Entity(child.id()),
        &relation.outer_key,
        false,
        Stream::Data,
    );
    if let Some(morph_key) = &relation.morph_key {
        builder.forward(
            Source::Known(Value::Null),
            Target::Entity(child.id()),
            morph_key,
            false,
            Stream::Data,
        );
    }
    builder.queue_store(child, visited)
}
