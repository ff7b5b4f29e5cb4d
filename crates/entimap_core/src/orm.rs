//! The entry point tying schema, mappers, identity map and driver together.

use crate::config::Config;
use crate::entity::{EntityHandle, RelationValue};
use crate::error::{CoreError, CoreResult};
use crate::heap::{Heap, Node, NodeStatus, RelationSnapshot};
use crate::mapper::{Mapper, MapperRegistry};
use crate::schema::Schema;
use crate::transaction::Transaction;
use crate::types::RunSummary;
use entimap_driver::{Driver, Row};
use tracing::debug;

/// Owns the identity map of one persistence scope.
///
/// Entities are tracked from the moment they are hydrated or first
/// persisted until they are detached or the `Orm` is dropped.
///
/// # Example
///
/// ```rust
/// use entimap_core::{EntitySchema, EntityHandle, Orm, Schema};
/// use entimap_driver::{InMemoryDriver, TableDef};
///
/// let driver = InMemoryDriver::new();
/// driver.create_table(TableDef::new("users", "id"));
///
/// let schema = Schema::new().with(EntitySchema::new("user", "users", "id").columns(["email"]));
/// let mut orm = Orm::new(schema, driver.clone()).unwrap();
///
/// let user = EntityHandle::new("user").with("email", "ada@example.com");
/// let summary = orm.unit_of_work(|uow| {
///     uow.persist(&user);
///     Ok(())
/// }).unwrap();
///
/// assert_eq!(summary.inserted, 1);
/// assert_eq!(user.get("id").as_integer(), Some(1));
/// ```
pub struct Orm<D: Driver> {
    pub(crate) config: Config,
    pub(crate) schema: Schema,
    pub(crate) mappers: MapperRegistry,
    pub(crate) heap: Heap,
    pub(crate) driver: D,
}

impl<D: Driver> Orm<D> {
    /// Creates an ORM over a validated schema.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` or `UnknownRole` if the schema is
    /// inconsistent.
    pub fn new(schema: Schema, driver: D) -> CoreResult<Self> {
        schema.validate()?;
        debug!(roles = schema.entities().count(), "schema validated");
        Ok(Self {
            config: Config::default(),
            schema,
            mappers: MapperRegistry::new(),
            heap: Heap::new(),
            driver,
        })
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Registers a mapper for one role.
    #[must_use]
    pub fn with_mapper(mut self, role: impl Into<String>, mapper: impl Mapper + 'static) -> Self {
        self.mappers.register(role, mapper);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the identity map.
    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Returns the driver.
    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Returns the driver mutably.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Returns the status of a tracked entity.
    #[must_use]
    pub fn status(&self, entity: &EntityHandle) -> Option<NodeStatus> {
        self.heap.get(entity).map(|node| node.status)
    }

    /// Starts collecting a unit of work.
    pub fn transaction(&mut self) -> Transaction<'_, D> {
        Transaction::new(self)
    }

    /// Collects a unit of work in `f` and runs it.
    ///
    /// # Errors
    ///
    /// Returns the error of `f` without touching the database, or the
    /// error of the run.
    pub fn unit_of_work<F>(&mut self, f: F) -> CoreResult<RunSummary>
    where
        F: FnOnce(&mut Transaction<'_, D>) -> CoreResult<()>,
    {
        let mut transaction = self.transaction();
        f(&mut transaction)?;
        transaction.run()
    }

    /// Tracks an entity loaded from a row.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole` for an unmapped role, `InvalidOperation` if
    /// the row has no primary key.
    pub fn hydrate(&mut self, role: &str, row: Row) -> CoreResult<EntityHandle> {
        let schema = self.schema.entity(role)?;
        if row.get(&schema.primary_key).map_or(true, |v| v.is_null()) {
            return Err(CoreError::invalid_operation(format!(
                "cannot hydrate {role} without {}",
                schema.primary_key
            )));
        }
        let entity = EntityHandle::from_row(role, row.clone());
        self.heap.put(entity.clone(), Node::managed(role, row))?;
        Ok(entity)
    }

    /// Sets a loaded relation of a tracked entity and records it as
    /// persisted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the entity is not tracked or the
    /// relation is not mapped.
    pub fn hydrate_relation(
        &mut self,
        owner: &EntityHandle,
        relation: &str,
        value: RelationValue,
    ) -> CoreResult<()> {
        let schema = self.schema.entity(&owner.role())?;
        if schema.find_relation(relation).is_none() {
            return Err(CoreError::invalid_operation(format!(
                "{} has no relation {relation}",
                owner.role()
            )));
        }
        let node = self.heap.get_mut(owner).ok_or_else(|| {
            CoreError::invalid_operation(format!("{} {} is not tracked", owner.role(), owner.id()))
        })?;

        let snapshot = match &value {
            RelationValue::Pivoted(collection) => RelationSnapshot::Pivoted(
                collection
                    .entries()
                    .iter()
                    .filter_map(|entry| {
                        entry
                            .pivot
                            .clone()
                            .map(|pivot| (entry.target.clone(), pivot))
                    })
                    .collect(),
            ),
            other => RelationSnapshot::Targets(other.targets()),
        };
        node.relations.insert(relation.to_string(), snapshot);
        owner.set_relation(relation, value);
        Ok(())
    }

    /// Stops tracking an entity, returning its last state record.
    pub fn detach(&mut self, entity: &EntityHandle) -> Option<Node> {
        self.heap.remove(entity)
    }
}
