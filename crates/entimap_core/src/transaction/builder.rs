//! Command graph construction.
//!
//! The builder walks the scheduled entities and their loaded relations,
//! reserving one slot per entity and collecting *forwards*: declarations
//! that a column of one entity (or command) takes its value from another
//! entity's key. Once the walk is over every forward is resolved into
//! either a known value or a context link between two commands, and the
//! slots are filled with the commands returned by the mappers.

use crate::command::{AtomicCommand, Command, CommandGraph, Condition, ContextLink, Stream};
use crate::entity::{EntityHandle, InstanceId};
use crate::error::{CoreError, CoreResult};
use crate::heap::{Heap, Node, NodeStatus, RelationSnapshot, Visited};
use crate::mapper::MapperRegistry;
use crate::relation;
use crate::schema::Schema;
use crate::types::CommandId;
use entimap_driver::Value;
use std::collections::HashMap;

/// What the unit of work does with a queued entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Store,
    Delete,
}

#[derive(Debug)]
struct Entry {
    entity: EntityHandle,
    intent: Intent,
    slot: CommandId,
}

/// Where a forwarded value comes from.
#[derive(Debug, Clone)]
pub(crate) enum Source {
    /// A value known while building.
    Known(Value),
    /// A column of another entity, possibly produced during execution.
    Entity { entity: EntityHandle, key: String },
}

impl Source {
    pub(crate) fn entity(entity: &EntityHandle, key: &str) -> Self {
        Self::Entity {
            entity: entity.clone(),
            key: key.to_string(),
        }
    }
}

/// Where a forwarded value goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Target {
    /// The slot command of an entity.
    Entity(InstanceId),
    /// A command created by a relation.
    Command(CommandId),
}

#[derive(Debug)]
struct Forward {
    source: Source,
    target: Target,
    column: String,
    required: bool,
    stream: Stream,
}

enum Origin {
    Void,
    Missing,
    Value(Value),
    Link(CommandId, String),
}

#[derive(Debug, Clone)]
enum Resolution {
    Known(Value, Stream),
    Link {
        producer: CommandId,
        key: String,
        required: bool,
        stream: Stream,
    },
}

/// A pivot created for a link that had none.
#[derive(Debug)]
pub(crate) struct Attachment {
    owner: EntityHandle,
    relation: String,
    target: EntityHandle,
    pivot: EntityHandle,
}

/// Everything a run needs once the graph is built.
#[derive(Debug)]
pub(crate) struct Plan {
    pub(crate) graph: CommandGraph,
    staged: Vec<(EntityHandle, Node)>,
    snapshots: Vec<(EntityHandle, String, RelationSnapshot)>,
    attachments: Vec<Attachment>,
}

impl Plan {
    /// Records the outcome of a committed run in the identity map.
    pub(crate) fn apply(&mut self, heap: &mut Heap) {
        for (entity, node) in self.staged.drain(..) {
            if let Err(err) = heap.put(entity, node) {
                tracing::warn!(error = %err, "skipping state record of a tracked entity");
            }
        }
        self.graph.complete(heap);

        for (owner, relation, snapshot) in self.snapshots.drain(..) {
            if let Some(node) = heap.get_mut(&owner) {
                if node.status == NodeStatus::Managed {
                    node.relations.insert(relation, snapshot);
                }
            }
        }
        for attachment in self.attachments.drain(..) {
            attachment
                .owner
                .attach_pivot(&attachment.relation, &attachment.target, attachment.pivot);
        }
    }
}

/// Builds the command graph of one run.
pub(crate) struct GraphBuilder<'a> {
    schema: &'a Schema,
    mappers: &'a MapperRegistry,
    heap: &'a Heap,
    graph: CommandGraph,
    entries: Vec<Entry>,
    index: HashMap<InstanceId, usize>,
    staged: HashMap<InstanceId, (EntityHandle, Node)>,
    forwards: Vec<Forward>,
    deferred: Vec<CommandId>,
    orphans: Vec<(EntityHandle, CommandId)>,
    pivots: HashMap<(String, InstanceId, InstanceId), EntityHandle>,
    snapshots: Vec<(EntityHandle, String, RelationSnapshot)>,
    attachments: Vec<Attachment>,
}

impl<'a> GraphBuilder<'a> {
    pub(crate) fn new(schema: &'a Schema, mappers: &'a MapperRegistry, heap: &'a Heap) -> Self {
        Self {
            schema,
            mappers,
            heap,
            graph: CommandGraph::new(),
            entries: Vec::new(),
            index: HashMap::new(),
            staged: HashMap::new(),
            forwards: Vec::new(),
            deferred: Vec::new(),
            orphans: Vec::new(),
            pivots: HashMap::new(),
            snapshots: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// Builds the graph for the scheduled entities.
    ///
    /// Deletes are queued before stores, so an entity scheduled both ways
    /// is deleted.
    pub(crate) fn build(
        mut self,
        persist: &[EntityHandle],
        delete: &[EntityHandle],
    ) -> CoreResult<Plan> {
        let mut visited = Visited::new();
        let mut roots = Vec::with_capacity(persist.len() + delete.len());

        for entity in delete {
            roots.push(self.queue_delete(entity, &mut visited)?);
        }
        for entity in persist {
            roots.push(self.queue_store(entity, &mut visited)?);
        }

        // Children dropped from a relation are deleted in the place their
        // relation reserved, unless the run stores them elsewhere.
        loop {
            let orphans = std::mem::take(&mut self.orphans);
            if orphans.is_empty() {
                break;
            }
            for (orphan, placeholder) in orphans {
                if !self.index.contains_key(&orphan.id()) {
                    let delete = self.queue_delete(&orphan, &mut visited)?;
                    self.graph
                        .replace(placeholder, Command::Sequence(vec![delete]))?;
                }
            }
        }

        let root = self.graph.sequence(roots);
        self.graph.set_root(root);

        let resolved = self.resolve_forwards()?;
        self.fill_slots(&resolved)?;
        self.connect(resolved)?;
        self.graph.validate()?;

        let mut staged = Vec::with_capacity(self.staged.len());
        for (id, record) in std::mem::take(&mut self.staged) {
            if self.intent_of(id) == Some(Intent::Store) {
                staged.push(record);
            }
        }

        Ok(Plan {
            graph: self.graph,
            staged,
            snapshots: self.snapshots,
            attachments: self.attachments,
        })
    }

    /// Queues an entity and its loaded relations for storage.
    ///
    /// Returns a `Nil` command when the entity is already queued.
    pub(crate) fn queue_store(
        &mut self,
        entity: &EntityHandle,
        visited: &mut Visited,
    ) -> CoreResult<CommandId> {
        if self.index.contains_key(&entity.id()) {
            return Ok(self.nil());
        }
        let registry = self.schema;
        let role = entity.role();
        let schema = registry.entity(&role)?;

        let slot = self.graph.reserve();
        self.enqueue(entity, Intent::Store, slot);
        if !self.heap.contains(entity) {
            self.staged
                .insert(entity.id(), (entity.clone(), Node::new(&role)));
        }

        let mut before = Vec::new();
        let mut after = Vec::new();
        for relation in &schema.relations {
            if !visited.mark_visited(entity.id(), &relation.name) {
                continue;
            }
            let value = entity.relation(&relation.name);
            if !value.is_loaded() {
                continue;
            }
            let command = relation::store(self, visited, entity, schema, relation, &value)?;
            if relation.kind.is_dependency() {
                before.push(command);
            } else {
                after.push(command);
            }
        }

        before.push(slot);
        before.extend(after);
        Ok(self.graph.sequence(before))
    }

    /// Queues an entity for deletion, dependents first.
    ///
    /// An entity already queued for storage is switched to deletion.
    pub(crate) fn queue_delete(
        &mut self,
        entity: &EntityHandle,
        visited: &mut Visited,
    ) -> CoreResult<CommandId> {
        if let Some(&i) = self.index.get(&entity.id()) {
            self.entries[i].intent = Intent::Delete;
            return Ok(self.nil());
        }
        let registry = self.schema;
        let schema = registry.entity(&entity.role())?;

        let slot = self.graph.reserve();
        self.enqueue(entity, Intent::Delete, slot);

        let mut commands = Vec::new();
        for relation in &schema.relations {
            if !visited.mark_visited(entity.id(), &relation.name) {
                continue;
            }
            commands.push(relation::delete(self, visited, entity, relation)?);
        }

        let guarded = self.graph.conditional(
            Condition::Persisted {
                entity: entity.clone(),
                primary_key: schema.primary_key.clone(),
            },
            slot,
        );
        commands.push(guarded);
        Ok(self.graph.sequence(commands))
    }

    /// Declares that `column` of `target` takes its value from `source`.
    pub(crate) fn forward(
        &mut self,
        source: Source,
        target: Target,
        column: &str,
        required: bool,
        stream: Stream,
    ) {
        self.forwards.push(Forward {
            source,
            target,
            column: column.to_string(),
            required,
            stream,
        });
    }

    pub(crate) fn nil(&mut self) -> CommandId {
        self.graph.reserve()
    }

    /// Adds a command owned by an entity outside of its slot.
    pub(crate) fn push(&mut self, command: AtomicCommand) -> CommandId {
        let id = self.graph.push(command);
        self.deferred.push(id);
        id
    }

    pub(crate) fn sequence(&mut self, children: Vec<CommandId>) -> CommandId {
        self.graph.sequence(children)
    }

    pub(crate) fn conditional(&mut self, condition: Condition, inner: CommandId) -> CommandId {
        self.graph.conditional(condition, inner)
    }

    /// Returns the slot of a queued entity.
    pub(crate) fn slot_of(&self, entity: &EntityHandle) -> Option<CommandId> {
        self.index.get(&entity.id()).map(|&i| self.entries[i].slot)
    }

    /// Returns whether no row of the entity exists yet.
    pub(crate) fn is_unsaved(&self, entity: &EntityHandle) -> bool {
        self.node(entity)
            .map_or(true, |node| matches!(node.status, NodeStatus::New | NodeStatus::Deleted))
    }

    /// Returns the last persisted contents of a relation.
    pub(crate) fn snapshot(&self, owner: &EntityHandle, relation: &str) -> Option<RelationSnapshot> {
        self.node(owner)
            .and_then(|node| node.relations.get(relation))
            .cloned()
    }

    pub(crate) fn record_snapshot(
        &mut self,
        owner: &EntityHandle,
        relation: &str,
        snapshot: RelationSnapshot,
    ) {
        self.snapshots
            .push((owner.clone(), relation.to_string(), snapshot));
    }

    /// Reserves the place of an orphan's delete.
    ///
    /// The slot stays `Nil` if the run stores the entity anyway.
    pub(crate) fn orphan(&mut self, entity: EntityHandle) -> CommandId {
        let placeholder = self.graph.reserve();
        self.orphans.push((entity, placeholder));
        placeholder
    }

    /// Returns the pivot already created in this run for a pair.
    pub(crate) fn shared_pivot(
        &self,
        role: &str,
        a: &EntityHandle,
        b: &EntityHandle,
    ) -> Option<EntityHandle> {
        self.pivots.get(&pair_key(role, a, b)).cloned()
    }

    pub(crate) fn share_pivot(
        &mut self,
        role: &str,
        a: &EntityHandle,
        b: &EntityHandle,
        pivot: &EntityHandle,
    ) {
        self.pivots
            .entry(pair_key(role, a, b))
            .or_insert_with(|| pivot.clone());
    }

    pub(crate) fn attach(
        &mut self,
        owner: &EntityHandle,
        relation: &str,
        target: &EntityHandle,
        pivot: &EntityHandle,
    ) {
        self.attachments.push(Attachment {
            owner: owner.clone(),
            relation: relation.to_string(),
            target: target.clone(),
            pivot: pivot.clone(),
        });
    }

    fn enqueue(&mut self, entity: &EntityHandle, intent: Intent, slot: CommandId) {
        self.index.insert(entity.id(), self.entries.len());
        self.entries.push(Entry {
            entity: entity.clone(),
            intent,
            slot,
        });
    }

    fn node(&self, entity: &EntityHandle) -> Option<&Node> {
        self.heap
            .get(entity)
            .or_else(|| self.staged.get(&entity.id()).map(|(_, node)| node))
    }

    fn intent_of(&self, id: InstanceId) -> Option<Intent> {
        self.index.get(&id).map(|&i| self.entries[i].intent)
    }

    fn origin(&self, source: &Source) -> Origin {
        let (entity, key) = match source {
            Source::Known(value) => return Origin::Value(value.clone()),
            Source::Entity { entity, key } => (entity, key),
        };
        let entry = self.index.get(&entity.id()).map(|&i| &self.entries[i]);
        match entry {
            Some(entry) if entry.intent == Intent::Delete => Origin::Void,
            Some(entry) if self.is_unsaved(entity) => Origin::Link(entry.slot, key.clone()),
            entry => {
                let value = entity.get(key);
                if !value.is_null() {
                    Origin::Value(value)
                } else if let Some(entry) = entry {
                    Origin::Link(entry.slot, key.clone())
                } else {
                    Origin::Missing
                }
            }
        }
    }

    fn target_table(&self, target: Target) -> String {
        match target {
            Target::Entity(id) => self
                .index
                .get(&id)
                .and_then(|&i| self.schema.entity(&self.entries[i].entity.role()).ok())
                .map_or_else(String::new, |schema| schema.table.clone()),
            Target::Command(id) => self
                .graph
                .atomic(id)
                .map_or_else(String::new, |atomic| atomic.table().to_string()),
        }
    }

    /// Resolves every forward, one outcome per target column.
    ///
    /// A link or a non-null value wins over a plain `Null`; among those the
    /// first declared wins.
    fn resolve_forwards(&mut self) -> CoreResult<Vec<(Target, String, Resolution)>> {
        let forwards = std::mem::take(&mut self.forwards);
        let mut groups: Vec<((Target, String), Vec<Forward>)> = Vec::new();
        let mut positions: HashMap<(Target, String), usize> = HashMap::new();
        for forward in forwards {
            let key = (forward.target, forward.column.clone());
            match positions.get(&key) {
                Some(&i) => groups[i].1.push(forward),
                None => {
                    positions.insert(key.clone(), groups.len());
                    groups.push((key, vec![forward]));
                }
            }
        }

        let mut resolved = Vec::new();
        'groups: for ((target, column), group) in groups {
            if let Target::Entity(id) = target {
                if self.intent_of(id) != Some(Intent::Store) {
                    continue;
                }
            }

            let mut null = None;
            let mut unresolved = false;
            for forward in &group {
                match self.origin(&forward.source) {
                    Origin::Void => {}
                    Origin::Link(producer, key) => {
                        let resolution = Resolution::Link {
                            producer,
                            key,
                            required: forward.required,
                            stream: forward.stream,
                        };
                        resolved.push((target, column, resolution));
                        continue 'groups;
                    }
                    Origin::Value(value) if !value.is_null() => {
                        resolved.push((target, column, Resolution::Known(value, forward.stream)));
                        continue 'groups;
                    }
                    Origin::Value(_) => null = Some(forward.stream),
                    Origin::Missing => unresolved |= forward.required,
                }
            }

            if unresolved {
                return Err(CoreError::unresolved(self.target_table(target), column));
            }
            if let Some(stream) = null {
                resolved.push((target, column, Resolution::Known(Value::Null, stream)));
            }
        }
        Ok(resolved)
    }

    /// Replaces every reserved slot with the mapper's command.
    fn fill_slots(&mut self, resolved: &[(Target, String, Resolution)]) -> CoreResult<()> {
        let mut overrides: HashMap<InstanceId, Vec<(&str, &Resolution)>> = HashMap::new();
        for (target, column, resolution) in resolved {
            if let Target::Entity(id) = target {
                overrides
                    .entry(*id)
                    .or_default()
                    .push((column.as_str(), resolution));
            }
        }

        let registry = self.schema;
        let mappers = self.mappers;
        for i in 0..self.entries.len() {
            let entity = self.entries[i].entity.clone();
            let slot = self.entries[i].slot;
            let role = entity.role();
            let schema = registry.entity(&role)?;
            let mapper = mappers.get(&role);

            let command = match self.entries[i].intent {
                Intent::Delete => match self.node(&entity) {
                    Some(node) => mapper.build_delete_command(schema, node)?,
                    None => Command::Nil,
                },
                Intent::Store => {
                    let mut node = self.node(&entity).cloned().unwrap_or_else(|| Node::new(&role));
                    if node.status == NodeStatus::Deleted {
                        node.status = NodeStatus::New;
                    }

                    let mut current = mapper.extract(schema, &entity);
                    let mut linked = Vec::new();
                    for (column, resolution) in overrides.get(&entity.id()).into_iter().flatten() {
                        match resolution {
                            Resolution::Known(value, _) => {
                                current.insert((*column).to_string(), value.clone());
                            }
                            Resolution::Link { .. } => {
                                current.insert((*column).to_string(), Value::Null);
                                linked.push(*column);
                            }
                        }
                    }

                    let mut diff = node.diff(&current);
                    for column in linked {
                        diff.insert(column.to_string(), Value::Null);
                    }
                    if node.status == NodeStatus::Managed && diff.is_empty() {
                        Command::Nil
                    } else {
                        mapper.build_command(schema, &node, &current, &diff)?
                    }
                }
            };

            let command = match command {
                Command::Atomic(atomic) => Command::Atomic(atomic.with_owner(entity)),
                other => other,
            };
            self.graph.replace(slot, command)?;
        }

        // Follow-up commands of entities that ended up deleted are dropped.
        for id in std::mem::take(&mut self.deferred) {
            let dropped = self
                .graph
                .atomic(id)
                .and_then(AtomicCommand::owner)
                .is_some_and(|owner| self.intent_of(owner.id()) != Some(Intent::Store));
            if dropped {
                self.graph.replace(id, Command::Nil)?;
            }
        }
        Ok(())
    }

    /// Turns resolved forwards into context links and registered values.
    fn connect(&mut self, resolved: Vec<(Target, String, Resolution)>) -> CoreResult<()> {
        for (target, column, resolution) in resolved {
            let consumer = match target {
                Target::Entity(id) => match self.index.get(&id) {
                    Some(&i) => self.entries[i].slot,
                    None => continue,
                },
                Target::Command(id) => id,
            };

            match resolution {
                Resolution::Link {
                    producer,
                    key,
                    required,
                    stream,
                } => {
                    let link = ContextLink::new(producer, key, consumer, column)
                        .required(required)
                        .stream(stream);
                    self.graph.link(link)?;
                }
                Resolution::Known(value, stream) => {
                    if let Target::Command(id) = target {
                        if let Some(atomic) = self.graph.atomic_mut(id) {
                            atomic.register(column, value, false, stream);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn pair_key(role: &str, a: &EntityHandle, b: &EntityHandle) -> (String, InstanceId, InstanceId) {
    let (a, b) = (a.id(), b.id());
    if a <= b {
        (role.to_string(), a, b)
    } else {
        (role.to_string(), b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntitySchema, RelationSchema};
    use entimap_driver::{Operation, Row};

    fn schema() -> Schema {
        Schema::new()
            .with(
                EntitySchema::new("user", "users", "id")
                    .columns(["email"])
                    .relation(RelationSchema::has_many("posts", "post", "id", "user_id")),
            )
            .with(
                EntitySchema::new("post", "posts", "id")
                    .columns(["user_id", "title"])
                    .relation(RelationSchema::belongs_to("user", "user", "user_id", "id")),
            )
    }

    fn managed_user(heap: &mut Heap, id: i64) -> EntityHandle {
        let mut row = Row::new();
        row.insert("id".into(), Value::Integer(id));
        row.insert("email".into(), Value::from("a@b.c"));
        let user = EntityHandle::from_row("user", row.clone());
        heap.put(user.clone(), Node::managed("user", row)).unwrap();
        user
    }

    fn operations(plan: &Plan) -> Vec<(Operation, String)> {
        plan.graph
            .atomics()
            .map(|(_, atomic)| (atomic.operation(), atomic.table().to_string()))
            .collect()
    }

    #[test]
    fn unchanged_managed_entity_builds_no_command() {
        let schema = schema();
        let mappers = MapperRegistry::new();
        let mut heap = Heap::new();
        let user = managed_user(&mut heap, 1);

        let plan = GraphBuilder::new(&schema, &mappers, &heap)
            .build(&[user], &[])
            .unwrap();

        assert_eq!(plan.graph.atomic_count(), 0);
        assert!(plan.staged.is_empty());
    }

    #[test]
    fn new_child_waits_on_new_parent() {
        let schema = schema();
        let mappers = MapperRegistry::new();
        let heap = Heap::new();
        let user = EntityHandle::new("user").with("email", "a@b.c");
        user.push("posts", EntityHandle::new("post").with("title", "hi"));

        let plan = GraphBuilder::new(&schema, &mappers, &heap)
            .build(&[user], &[])
            .unwrap();

        assert_eq!(
            operations(&plan),
            vec![
                (Operation::Insert, "users".to_string()),
                (Operation::Insert, "posts".to_string())
            ]
        );
        let links = plan.graph.links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].key, "id");
        assert_eq!(links[0].target, "user_id");
        assert!(links[0].required);
        assert_eq!(plan.staged.len(), 2);
    }

    #[test]
    fn saved_parent_key_is_copied_directly() {
        let schema = schema();
        let mappers = MapperRegistry::new();
        let mut heap = Heap::new();
        let user = managed_user(&mut heap, 7);
        let post = EntityHandle::new("post").with("title", "hi");
        post.set_one("user", Some(user));

        let plan = GraphBuilder::new(&schema, &mappers, &heap)
            .build(&[post], &[])
            .unwrap();

        assert!(plan.graph.links().is_empty());
        let (_, insert) = plan.graph.atomics().next().unwrap();
        assert_eq!(insert.table(), "posts");
        assert_eq!(insert.data()["user_id"], Value::Integer(7));
    }

    #[test]
    fn delete_takes_precedence_over_store() {
        let schema = schema();
        let mappers = MapperRegistry::new();
        let mut heap = Heap::new();
        let user = managed_user(&mut heap, 1);
        user.set("email", "changed@b.c");

        let plan = GraphBuilder::new(&schema, &mappers, &heap)
            .build(&[user.clone()], &[user])
            .unwrap();

        assert_eq!(operations(&plan), vec![(Operation::Delete, "users".to_string())]);
    }

    #[test]
    fn removed_child_is_released_before_its_replacement() {
        let schema = schema();
        let mappers = MapperRegistry::new();
        let mut heap = Heap::new();
        let user = managed_user(&mut heap, 1);
        let mut row = Row::new();
        row.insert("id".into(), Value::Integer(1));
        row.insert("user_id".into(), Value::Integer(1));
        row.insert("title".into(), Value::from("old"));
        let old = EntityHandle::from_row("post", row.clone());
        heap.put(old.clone(), Node::managed("post", row)).unwrap();
        if let Some(node) = heap.get_mut(&user) {
            node.relations
                .insert("posts".into(), RelationSnapshot::Targets(vec![old]));
        }
        user.push("posts", EntityHandle::new("post").with("title", "new"));

        let plan = GraphBuilder::new(&schema, &mappers, &heap)
            .build(&[user], &[])
            .unwrap();

        let root = plan.graph.root().unwrap();
        let ordered: Vec<_> = plan
            .graph
            .subtree_atomics(root)
            .into_iter()
            .map(|id| {
                let atomic = plan.graph.atomic(id).unwrap();
                (atomic.operation(), atomic.table().to_string())
            })
            .collect();
        assert_eq!(
            ordered,
            vec![
                (Operation::Delete, "posts".to_string()),
                (Operation::Insert, "posts".to_string())
            ]
        );
    }

    #[test]
    fn missing_required_parent_key_fails_the_build() {
        let schema = Schema::new()
            .with(EntitySchema::new("user", "users", "id").columns(["email"]))
            .with(
                EntitySchema::new("post", "posts", "id")
                    .columns(["user_id"])
                    .relation(
                        RelationSchema::belongs_to("user", "user", "user_id", "id").cascade(false),
                    ),
            );
        let mappers = MapperRegistry::new();
        let heap = Heap::new();
        let post = EntityHandle::new("post");
        post.set_one("user", Some(EntityHandle::new("user")));

        let err = GraphBuilder::new(&schema, &mappers, &heap)
            .build(&[post], &[])
            .err()
            .unwrap();

        assert!(matches!(
            err,
            CoreError::RequiredContextUnresolved { ref table, ref key } if table == "posts" && key == "user_id"
        ));
    }

    #[test]
    fn pivot_is_shared_by_both_sides() {
        use crate::schema::ThroughSchema;

        let schema = Schema::new()
            .with(
                EntitySchema::new("user", "users", "id").relation(RelationSchema::many_to_many(
                    "tags",
                    "tag",
                    "id",
                    "id",
                    ThroughSchema::new("tag_user", "user_id", "tag_id"),
                )),
            )
            .with(
                EntitySchema::new("tag", "tags", "id").relation(RelationSchema::many_to_many(
                    "users",
                    "user",
                    "id",
                    "id",
                    ThroughSchema::new("tag_user", "tag_id", "user_id"),
                )),
            )
            .with(EntitySchema::new("tag_user", "tag_user", "id").columns(["user_id", "tag_id"]));
        let mappers = MapperRegistry::new();
        let heap = Heap::new();
        let user = EntityHandle::new("user");
        let tag = EntityHandle::new("tag");
        user.link("tags", tag.clone(), None);
        tag.link("users", user.clone(), None);

        let plan = GraphBuilder::new(&schema, &mappers, &heap)
            .build(&[user], &[])
            .unwrap();

        let pivots = operations(&plan)
            .into_iter()
            .filter(|(_, table)| table == "tag_user")
            .count();
        assert_eq!(pivots, 1);
        assert_eq!(plan.attachments.len(), 2);
    }
}
