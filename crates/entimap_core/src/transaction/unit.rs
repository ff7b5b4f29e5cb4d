//! The unit of work.

use crate::entity::EntityHandle;
use crate::error::{CoreError, CoreResult};
use crate::heap::NodeStatus;
use crate::orm::Orm;
use crate::transaction::builder::GraphBuilder;
use crate::transaction::executor::Executor;
use crate::types::{Phase, RunSummary};
use entimap_driver::Driver;
use tracing::{debug, info, warn};

/// Collects entities to persist or delete and writes them in one database
/// transaction.
///
/// The schedule is cleared by every [`run`](Self::run), whatever its
/// outcome. A failed run leaves the identity map as it was before the run.
pub struct Transaction<'o, D: Driver> {
    orm: &'o mut Orm<D>,
    persist: Vec<EntityHandle>,
    delete: Vec<EntityHandle>,
    phase: Phase,
}

impl<'o, D: Driver> Transaction<'o, D> {
    pub(crate) fn new(orm: &'o mut Orm<D>) -> Self {
        Self {
            orm,
            persist: Vec::new(),
            delete: Vec::new(),
            phase: Phase::Collecting,
        }
    }

    /// Schedules an entity, and its loaded relations, for storage.
    pub fn persist(&mut self, entity: &EntityHandle) -> &mut Self {
        self.phase = Phase::Collecting;
        if !self.persist.contains(entity) {
            self.persist.push(entity.clone());
        }
        self
    }

    /// Schedules an entity for deletion.
    ///
    /// Deletion wins over a storage scheduled in the same run.
    pub fn delete(&mut self, entity: &EntityHandle) -> &mut Self {
        self.phase = Phase::Collecting;
        if !self.delete.contains(entity) {
            self.delete.push(entity.clone());
        }
        self
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the number of scheduled entities.
    #[must_use]
    pub fn scheduled(&self) -> usize {
        self.persist.len() + self.delete.len()
    }

    /// Builds and executes the command graph of the scheduled entities.
    ///
    /// # Errors
    ///
    /// Returns the building or execution error. On error the database
    /// transaction is rolled back and every state record is restored.
    pub fn run(&mut self) -> CoreResult<RunSummary> {
        let persist = std::mem::take(&mut self.persist);
        let delete = std::mem::take(&mut self.delete);
        if persist.is_empty() && delete.is_empty() {
            self.phase = Phase::Committed;
            return Ok(RunSummary::default());
        }

        self.phase = Phase::Building;
        debug!(
            persist = persist.len(),
            delete = delete.len(),
            "building command graph"
        );
        let orm = &mut *self.orm;
        let built = GraphBuilder::new(&orm.schema, &orm.mappers, &orm.heap)
            .build(&persist, &delete)
            .and_then(|plan| {
                let commands = plan.graph.atomic_count();
                if orm.config.exceeds_limit(commands) {
                    return Err(CoreError::GraphTooLarge {
                        commands,
                        limit: orm.config.max_commands,
                    });
                }
                Ok(plan)
            });
        let mut plan = match built {
            Ok(plan) => plan,
            Err(err) => {
                self.phase = Phase::RolledBack;
                warn!(error = %err, "command graph rejected");
                return Err(err);
            }
        };
        debug!(
            commands = plan.graph.atomic_count(),
            links = plan.graph.links().len(),
            "command graph built"
        );

        self.phase = Phase::Executing;
        if let Err(err) = orm.driver.begin() {
            self.phase = Phase::RolledBack;
            warn!(error = %err, "driver refused to begin");
            return Err(err.into());
        }
        plan.graph.seal(&mut orm.heap);

        let outcome = Executor::new(&mut plan.graph, &orm.heap, orm.config.trace_statements)
            .run(&mut orm.driver)
            .and_then(|summary| {
                orm.driver.commit()?;
                Ok(summary)
            });

        match outcome {
            Ok(summary) => {
                plan.apply(&mut orm.heap);
                if orm.config.evict_deleted {
                    let evicted = orm
                        .heap
                        .evict_where(|node| node.status == NodeStatus::Deleted);
                    debug!(evicted, "deleted entities evicted");
                }
                self.phase = Phase::Committed;
                info!(
                    inserted = summary.inserted,
                    updated = summary.updated,
                    deleted = summary.deleted,
                    skipped = summary.skipped,
                    "unit of work committed"
                );
                Ok(summary)
            }
            Err(err) => {
                plan.graph.roll_back(&mut orm.heap);
                if let Err(rollback) = orm.driver.rollback() {
                    warn!(error = %rollback, "driver rollback failed");
                }
                self.phase = Phase::RolledBack;
                warn!(error = %err, "unit of work rolled back");
                Err(err)
            }
        }
    }
}
