//! Many-to-many through pivot entities.

use crate::command::Stream;
use crate::entity::{EntityHandle, RelationValue};
use crate::error::{CoreError, CoreResult};
use crate::heap::{RelationSnapshot, Visited};
use crate::schema::{RelationSchema, ThroughSchema};
use crate::transaction::builder::{GraphBuilder, Source, Target};
use crate::types::CommandId;

fn through<'r>(owner: &EntityHandle, relation: &'r RelationSchema) -> CoreResult<&'r ThroughSchema> {
    relation.through.as_ref().ok_or_else(|| {
        CoreError::invalid_schema(
            owner.role(),
            format!("relation {} has no pivot", relation.name),
        )
    })
}

pub(super) fn store(
    builder: &mut GraphBuilder<'_>,
    visited: &mut Visited,
    owner: &EntityHandle,
    relation: &RelationSchema,
    value: &RelationValue,
) -> CoreResult<CommandId> {
    let through = through(owner, relation)?;
    let snapshot = builder.snapshot(owner, &relation.name);
    let entries = value.pivoted_entries();

    let mut commands = Vec::new();
    let mut links = Vec::with_capacity(entries.len());

    for entry in &entries {
        let target = &entry.target;
        if relation.cascade {
            commands.push(builder.queue_store(target, visited)?);
        }

        let pivot = entry
            .pivot
            .clone()
            .or_else(|| snapshot.as_ref().and_then(|s| s.pivot_of(target)))
            .or_else(|| builder.shared_pivot(&through.role, owner, target))
            .unwrap_or_else(|| EntityHandle::new(&through.role));
        if entry.pivot.is_none() {
            builder.attach(owner, &relation.name, target, &pivot);
        }
        builder.share_pivot(&through.role, owner, target, &pivot);

        builder.forward(
            Source::entity(owner, &relation.inner_key),
            Target::Entity(pivot.id()),
            &through.inner_key,
            true,
            Stream::Data,
        );
        builder.forward(
            Source::entity(target, &relation.outer_key),
            Target::Entity(pivot.id()),
            &through.outer_key,
            true,
            Stream::Data,
        );
        commands.push(builder.queue_store(&pivot, visited)?);
        links.push((target.clone(), pivot));
    }

    if let Some(RelationSnapshot::Pivoted(previous)) = &snapshot {
        for (target, pivot) in previous {
            if !entries.iter().any(|e| e.target == *target) {
                commands.push(builder.queue_delete(pivot, visited)?);
            }
        }
    }

    builder.record_snapshot(owner, &relation.name, RelationSnapshot::Pivoted(links));
    Ok(builder.sequence(commands))
}

pub(super) fn delete(
    builder: &mut GraphBuilder<'_>,
    visited: &mut Visited,
    owner: &EntityHandle,
    relation: &RelationSchema,
) -> CoreResult<CommandId> {
    let mut pivots: Vec<EntityHandle> = owner
        .relation(&relation.name)
        .pivoted_entries()
        .into_iter()
        .filter_map(|entry| entry.pivot)
        .collect();
    if let Some(RelationSnapshot::Pivoted(previous)) = builder.snapshot(owner, &relation.name) {
        for (_, pivot) in previous {
            if !pivots.contains(&pivot) {
                pivots.push(pivot);
            }
        }
    }

    let mut commands = Vec::new();
    for pivot in &pivots {
        commands.push(builder.queue_delete(pivot, visited)?);
    }
    Ok(builder.sequence(commands))
}
