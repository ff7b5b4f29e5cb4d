//! Belongs-to, plain and morphed.

use crate::command::Stream;
use crate::entity::{EntityHandle, RelationValue};
use crate::error::{CoreError, CoreResult};
use crate::heap::{RelationSnapshot, Visited};
use crate::schema::{RelationKind, RelationSchema};
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
    let Some(parent) = value.one() else {
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
        if let Some(morph_key) = &relation.morph_key {
            builder.forward(
                Source::Known(Value::Null),
                Target::Entity(owner.id()),
                morph_key,
                false,
                Stream::Data,
            );
        }
        builder.record_snapshot(owner, &relation.name, RelationSnapshot::Targets(Vec::new()));
        return Ok(builder.nil());
    };

    let command = if relation.cascade {
        builder.queue_store(&parent, visited)?
    } else {
        builder.nil()
    };

    builder.forward(
        Source::entity(&parent, &relation.outer_key),
        Target::Entity(owner.id()),
        &relation.inner_key,
        !relation.nullable,
        Stream::Data,
    );
    if relation.kind == RelationKind::BelongsToMorphed {
        if let Some(morph_key) = &relation.morph_key {
            builder.forward(
                Source::Known(Value::from(parent.role())),
                Target::Entity(owner.id()),
                morph_key,
                true,
                Stream::Data,
            );
        }
    }

    builder.record_snapshot(owner, &relation.name, RelationSnapshot::Targets(vec![parent]));
    Ok(command)
}
