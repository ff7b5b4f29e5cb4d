//! Pass-based execution of a command graph.

use crate::command::{AtomicCommand, Command, CommandGraph, Condition, ContextLink};
use crate::error::{CoreError, CoreResult};
use crate::heap::Heap;
use crate::types::{CommandId, RunSummary};
use entimap_driver::{Driver, Operation, Row};
use tracing::{debug, trace};

/// Runs every ready command of a graph until the root has executed.
///
/// Each pass walks the tree in declaration order and executes whatever
/// is ready. A pass that makes no progress ends the run with a
/// diagnostic.
pub(crate) struct Executor<'g> {
    graph: &'g mut CommandGraph,
    heap: &'g Heap,
    trace_statements: bool,
    summary: RunSummary,
}

impl<'g> Executor<'g> {
    pub(crate) fn new(graph: &'g mut CommandGraph, heap: &'g Heap, trace_statements: bool) -> Self {
        Self {
            graph,
            heap,
            trace_statements,
            summary: RunSummary::default(),
        }
    }

    /// Executes the graph against `driver`.
    ///
    /// # Errors
    ///
    /// Returns the first driver failure, `RequiredContextUnresolved` when a
    /// required value can no longer arrive, or `GraphDeadlock` when
    /// commands wait on each other.
    pub(crate) fn run(mut self, driver: &mut dyn Driver) -> CoreResult<RunSummary> {
        let Some(root) = self.graph.root() else {
            return Ok(self.summary);
        };

        let mut passes = 0usize;
        while !self.graph.is_executed(root) {
            passes += 1;
            if !self.pass(root, driver)? {
                return Err(self.diagnose(root));
            }
        }
        trace!(passes, "command graph executed");
        Ok(self.summary)
    }

    /// Walks `id` once. Returns whether anything executed or was decided.
    fn pass(&mut self, id: CommandId, driver: &mut dyn Driver) -> CoreResult<bool> {
        let step = match self.graph.get(id) {
            None | Some(Command::Nil) => return Ok(false),
            Some(Command::Atomic(atomic)) => {
                if atomic.is_finalized() || !atomic.is_ready() {
                    return Ok(false);
                }
                return self.execute(id, driver).map(|()| true);
            }
            Some(Command::Sequence(children)) => Step::Children(children.clone()),
            Some(Command::Conditional {
                condition,
                inner,
                decision,
            }) => match decision {
                Some(true) => Step::Children(vec![*inner]),
                Some(false) => return Ok(false),
                None => Step::Decide(condition.clone(), *inner),
            },
        };

        match step {
            Step::Children(children) => {
                let mut progress = false;
                for child in children {
                    progress |= self.pass(child, driver)?;
                }
                Ok(progress)
            }
            Step::Decide(condition, inner) => {
                let Some(outcome) = self.evaluate(&condition) else {
                    return Ok(false);
                };
                if let Some(Command::Conditional { decision, .. }) = self.graph.get_mut(id) {
                    *decision = Some(outcome);
                }
                if outcome {
                    self.pass(inner, driver)?;
                } else {
                    self.skip(inner);
                }
                Ok(true)
            }
        }
    }

    /// Decides a condition, or returns `None` while it cannot be decided.
    fn evaluate(&self, condition: &Condition) -> Option<bool> {
        match condition {
            Condition::Persisted {
                entity,
                primary_key,
            } => Some(
                self.heap
                    .get(entity)
                    .is_some_and(|node| node.is_persisted(primary_key)),
            ),
            Condition::HasContext { command, key } => {
                if !self.graph.is_executed(*command) {
                    return None;
                }
                Some(self.graph.atomic(*command).is_some_and(|atomic| {
                    atomic.is_executed()
                        && atomic.get_context().get(key).is_some_and(|v| !v.is_null())
                }))
            }
        }
    }

    fn execute(&mut self, id: CommandId, driver: &mut dyn Driver) -> CoreResult<()> {
        let atomic = self
            .graph
            .atomic_mut(id)
            .ok_or_else(|| CoreError::invalid_operation(format!("{id} is not atomic")))?;
        if self.trace_statements {
            debug!(statement = %atomic.statement(), "executing");
        }
        atomic.execute(driver)?;

        match atomic.operation() {
            Operation::Insert => self.summary.inserted += 1,
            Operation::Update => self.summary.updated += 1,
            Operation::Delete => self.summary.deleted += 1,
        }
        let context = atomic.get_context();
        self.propagate(id, Some(&context));
        Ok(())
    }

    /// Skips every atomic beneath `id` and releases their dependents.
    fn skip(&mut self, id: CommandId) {
        for atomic_id in self.graph.subtree_atomics(id) {
            let Some(atomic) = self.graph.atomic_mut(atomic_id) else {
                continue;
            };
            if atomic.is_finalized() {
                continue;
            }
            atomic.skip();
            self.summary.skipped += 1;
            self.propagate(atomic_id, None);
        }
    }

    /// Hands the context of a finished producer to its consumers.
    ///
    /// Consumers of a producer that yields no value keep required waits
    /// and drop optional ones.
    fn propagate(&mut self, producer: CommandId, context: Option<&Row>) {
        let links: Vec<ContextLink> = self
            .graph
            .links()
            .iter()
            .filter(|link| link.producer == producer)
            .cloned()
            .collect();

        for link in links {
            let Some(consumer) = self.graph.atomic_mut(link.consumer) else {
                continue;
            };
            match context
                .and_then(|c| c.get(&link.key))
                .filter(|v| !v.is_null())
            {
                Some(value) => consumer.register(link.target, value.clone(), false, link.stream),
                None if !link.required => {
                    consumer.cancel_wait(&link.target);
                }
                None => {}
            }
        }
    }

    /// Explains why a pass made no progress.
    fn diagnose(&self, root: CommandId) -> CoreError {
        let pending: Vec<(CommandId, &AtomicCommand)> = self
            .graph
            .subtree_atomics(root)
            .into_iter()
            .filter_map(|id| self.graph.atomic(id).map(|atomic| (id, atomic)))
            .filter(|(_, atomic)| !atomic.is_finalized())
            .collect();

        for (id, atomic) in &pending {
            for key in atomic.waits().keys() {
                let mut producers = self
                    .graph
                    .links()
                    .iter()
                    .filter(|link| link.consumer == *id && link.target == *key)
                    .map(|link| link.producer);
                if producers.all(|producer| self.graph.is_executed(producer)) {
                    return CoreError::unresolved(atomic.table(), key);
                }
            }
        }

        CoreError::GraphDeadlock {
            pending: pending
                .iter()
                .map(|(id, _)| self.graph.describe(*id))
                .collect(),
        }
    }
}

enum Step {
    Children(Vec<CommandId>),
    Decide(Condition, CommandId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ContextLink, Stream};
    use entimap_driver::{InMemoryDriver, TableDef, Value};

    fn driver() -> InMemoryDriver {
        let driver = InMemoryDriver::new();
        driver.create_table(TableDef::new("user", "id"));
        driver.create_table(TableDef::new("post", "id"));
        driver
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn executes_dependents_after_their_producer() {
        let mut driver = driver();
        let heap = Heap::new();
        let mut graph = CommandGraph::new();

        // declared child first to force a second pass
        let post = graph.push(AtomicCommand::insert(
            "post",
            "id",
            row(&[("title", "hello".into()), ("user_id", Value::Null)]),
        ));
        let user = graph.push(AtomicCommand::insert("user", "id", row(&[("email", "a@b.c".into())])));
        graph
            .link(ContextLink::new(user, "id", post, "user_id"))
            .unwrap();
        let root = graph.sequence(vec![post, user]);
        graph.set_root(root);

        let summary = Executor::new(&mut graph, &heap, true).run(&mut driver).unwrap();

        assert_eq!(summary.inserted, 2);
        let journal = driver.journal();
        assert_eq!(journal[0].table, "user");
        assert_eq!(journal[1].values["user_id"], Value::Integer(1));
    }

    #[test]
    fn conditional_on_missing_context_skips_inner() {
        let mut driver = driver();
        let heap = Heap::new();
        let mut graph = CommandGraph::new();

        let producer = graph.reserve();
        let update = graph.push(AtomicCommand::update(
            "user",
            "id",
            Row::new(),
            row(&[("id", 1.into())]),
        ));
        let gated = graph.conditional(
            Condition::HasContext {
                command: producer,
                key: "id".into(),
            },
            update,
        );
        let root = graph.sequence(vec![producer, gated]);
        graph.set_root(root);

        let summary = Executor::new(&mut graph, &heap, false).run(&mut driver).unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.writes(), 0);
        assert!(driver.journal().is_empty());
    }

    #[test]
    fn mutual_waits_are_reported_as_deadlock() {
        let mut driver = driver();
        let heap = Heap::new();
        let mut graph = CommandGraph::new();

        let a = graph.push(AtomicCommand::insert("user", "id", Row::new()));
        let b = graph.push(AtomicCommand::insert("post", "id", Row::new()));
        graph.link(ContextLink::new(a, "id", b, "user_id")).unwrap();
        graph.link(ContextLink::new(b, "id", a, "post_id")).unwrap();
        let root = graph.sequence(vec![a, b]);
        graph.set_root(root);

        let err = Executor::new(&mut graph, &heap, false)
            .run(&mut driver)
            .unwrap_err();

        match err {
            CoreError::GraphDeadlock { pending } => assert_eq!(pending.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(driver.journal().is_empty());
    }

    #[test]
    fn producer_without_value_fails_required_consumer() {
        let mut driver = driver();
        let heap = Heap::new();
        let mut graph = CommandGraph::new();

        let update = graph.push(AtomicCommand::update(
            "user",
            "id",
            row(&[("email", "x".into())]),
            row(&[("id", 7.into())]),
        ));
        let post = graph.push(AtomicCommand::insert("post", "id", Row::new()));
        graph
            .link(ContextLink::new(update, "missing", post, "user_id"))
            .unwrap();
        driver
            .seed("user", row(&[("id", 7.into()), ("email", "y".into())]))
            .unwrap();
        let root = graph.sequence(vec![update, post]);
        graph.set_root(root);

        let err = Executor::new(&mut graph, &heap, false)
            .run(&mut driver)
            .unwrap_err();

        assert!(matches!(err, CoreError::RequiredContextUnresolved { .. }));
    }

    #[test]
    fn optional_wait_is_dropped_when_producer_yields_nothing() {
        let mut driver = driver();
        let heap = Heap::new();
        let mut graph = CommandGraph::new();

        let producer = graph.push(AtomicCommand::update(
            "user",
            "id",
            row(&[("email", "x".into())]),
            row(&[("id", 7.into())]),
        ));
        let consumer = graph.push(AtomicCommand::insert("post", "id", Row::new()));
        graph
            .link(ContextLink::new(producer, "missing", consumer, "user_id").required(false))
            .unwrap();
        driver
            .seed("user", row(&[("id", 7.into()), ("email", "y".into())]))
            .unwrap();
        let root = graph.sequence(vec![producer, consumer]);
        graph.set_root(root);

        let summary = Executor::new(&mut graph, &heap, false).run(&mut driver).unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.inserted, 1);
        assert!(graph.atomic(consumer).unwrap().is_executed());
    }

    #[test]
    fn scope_stream_feeds_update_condition() {
        let mut driver = driver();
        let heap = Heap::new();
        let mut graph = CommandGraph::new();

        let insert = graph.push(AtomicCommand::insert("user", "id", row(&[("email", "a".into())])));
        let update = graph.push(AtomicCommand::update(
            "user",
            "id",
            row(&[("email", "b".into())]),
            Row::new(),
        ));
        graph
            .link(ContextLink::new(insert, "id", update, "id").stream(Stream::Scope))
            .unwrap();
        let root = graph.sequence(vec![insert, update]);
        graph.set_root(root);

        Executor::new(&mut graph, &heap, false).run(&mut driver).unwrap();

        let rows = driver.rows("user");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["email"], Value::from("b"));
    }
}
