//! Atomic table commands.

use super::{Stream, Wait};
use crate::entity::EntityHandle;
use crate::error::{CoreError, CoreResult};
use crate::heap::{Heap, NodeStatus};
use entimap_driver::{Driver, ExecOutcome, Operation, Row, Statement, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Execution state of an atomic command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    /// Not dispatched yet.
    Pending,
    /// Dispatched successfully.
    Executed,
    /// Will never be dispatched in this run.
    Skipped,
}

#[derive(Debug, Clone, Default)]
struct Payload {
    data: Row,
    scope: Row,
    context: Row,
    waits: BTreeMap<String, Wait>,
}

impl Payload {
    fn stream(&self, stream: Stream) -> &Row {
        match stream {
            Stream::Data => &self.data,
            Stream::Scope => &self.scope,
            Stream::Context => &self.context,
        }
    }

    fn stream_mut(&mut self, stream: Stream) -> &mut Row {
        match stream {
            Stream::Data => &mut self.data,
            Stream::Scope => &mut self.scope,
            Stream::Context => &mut self.context,
        }
    }
}

/// A single deferred insert, update or delete.
///
/// The payload may hold outstanding waits; the command is ready once every
/// wait has been resolved or dropped. `Null` counts as "no value" both for
/// resolution and for the first-writer-wins rule of [`register`].
///
/// [`register`]: AtomicCommand::register
#[derive(Debug, Clone)]
pub struct AtomicCommand {
    operation: Operation,
    table: String,
    primary_key: String,
    owner: Option<EntityHandle>,
    payload: Payload,
    state: CommandState,
    completed: bool,
    prior_status: Option<NodeStatus>,
    pristine: Option<Payload>,
}

impl AtomicCommand {
    fn new(operation: Operation, table: String, primary_key: String) -> Self {
        Self {
            operation,
            table,
            primary_key,
            owner: None,
            payload: Payload::default(),
            state: CommandState::Pending,
            completed: false,
            prior_status: None,
            pristine: None,
        }
    }

    /// Creates an insert. The generated key is published under
    /// `primary_key` after execution.
    pub fn insert(table: impl Into<String>, primary_key: impl Into<String>, data: Row) -> Self {
        let mut command = Self::new(Operation::Insert, table.into(), primary_key.into());
        command.payload.data = data;
        command
    }

    /// Creates an update of the rows matching `scope`.
    pub fn update(
        table: impl Into<String>,
        primary_key: impl Into<String>,
        data: Row,
        scope: Row,
    ) -> Self {
        let mut command = Self::new(Operation::Update, table.into(), primary_key.into());
        command.payload.data = data;
        command.payload.scope = scope;
        command
    }

    /// Creates a delete of the rows matching `scope`.
    pub fn delete(table: impl Into<String>, primary_key: impl Into<String>, scope: Row) -> Self {
        let mut command = Self::new(Operation::Delete, table.into(), primary_key.into());
        command.payload.scope = scope;
        command
    }

    /// Sets the entity whose state record this command finalizes.
    #[must_use]
    pub fn with_owner(mut self, owner: EntityHandle) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Returns the operation.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Returns the target table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the owning entity.
    #[must_use]
    pub fn owner(&self) -> Option<&EntityHandle> {
        self.owner.as_ref()
    }

    /// Returns the column payload.
    #[must_use]
    pub fn data(&self) -> &Row {
        &self.payload.data
    }

    /// Returns the row selection criteria.
    #[must_use]
    pub fn scope(&self) -> &Row {
        &self.payload.scope
    }

    /// Returns the execution state.
    #[must_use]
    pub fn state(&self) -> CommandState {
        self.state
    }

    /// Returns whether the command has been dispatched.
    #[must_use]
    pub fn is_executed(&self) -> bool {
        self.state == CommandState::Executed
    }

    /// Returns whether the command is executed or skipped.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.state != CommandState::Pending
    }

    /// Sets a payload value.
    ///
    /// If the key already holds a non-null value and `overwrite` is false,
    /// the call is a no-op. A non-null value resolves a wait on the same
    /// key and stream.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
        overwrite: bool,
        stream: Stream,
    ) {
        let key = key.into();
        let target = self.payload.stream_mut(stream);
        let present = target.get(&key).is_some_and(|v| !v.is_null());
        if !present || overwrite {
            target.insert(key.clone(), value.into());
        }

        let resolved = target.get(&key).is_some_and(|v| !v.is_null());
        if resolved
            && self
                .payload
                .waits
                .get(&key)
                .is_some_and(|w| w.stream == stream)
        {
            self.payload.waits.remove(&key);
        }
    }

    /// Declares that `key` must be resolved before execution.
    ///
    /// No-op if the stream already holds a non-null value for `key`.
    pub fn wait_context(&mut self, key: impl Into<String>, required: bool, stream: Stream) {
        let key = key.into();
        if self
            .payload
            .stream(stream)
            .get(&key)
            .is_some_and(|v| !v.is_null())
        {
            return;
        }
        // a required wait is never weakened by a later optional one
        let required = required
            || self
                .payload
                .waits
                .get(&key)
                .is_some_and(|w| w.required);
        self.payload.waits.insert(key, Wait { required, stream });
    }

    /// Drops an optional wait. Required waits are kept.
    ///
    /// Returns whether a wait was dropped.
    pub fn cancel_wait(&mut self, key: &str) -> bool {
        if self.payload.waits.get(key).is_some_and(|w| !w.required) {
            self.payload.waits.remove(key);
            return true;
        }
        false
    }

    /// Returns the outstanding waits.
    #[must_use]
    pub fn waits(&self) -> &BTreeMap<String, Wait> {
        &self.payload.waits
    }

    /// Returns whether no wait is outstanding.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.payload.waits.is_empty()
    }

    /// Returns the values this command offers to dependents.
    ///
    /// After an insert this includes the generated primary key.
    #[must_use]
    pub fn get_context(&self) -> Row {
        let mut context = self.payload.context.clone();
        context.extend(self.payload.scope.clone());
        context.extend(self.payload.data.clone());
        context
    }

    /// Builds the statement sent to the driver.
    #[must_use]
    pub fn statement(&self) -> Statement {
        match self.operation {
            Operation::Insert => Statement::insert(
                self.table.clone(),
                self.primary_key.clone(),
                self.payload.data.clone(),
            ),
            Operation::Update => Statement::update(
                self.table.clone(),
                self.payload.data.clone(),
                self.payload.scope.clone(),
            ),
            Operation::Delete => {
                Statement::delete(self.table.clone(), self.payload.scope.clone())
            }
        }
    }

    /// Dispatches the command.
    ///
    /// # Errors
    ///
    /// - `CommandNotReady` if a wait is outstanding
    /// - `InvalidOperation` if the command is already finalized
    /// - `Execution` if the driver rejects the statement
    pub fn execute(&mut self, driver: &mut dyn Driver) -> CoreResult<ExecOutcome> {
        if !self.is_ready() {
            return Err(CoreError::CommandNotReady {
                table: self.table.clone(),
                operation: self.operation,
                waiting: self.payload.waits.keys().cloned().collect(),
            });
        }
        if self.is_finalized() {
            return Err(CoreError::invalid_operation(format!(
                "{self} was already finalized"
            )));
        }

        let outcome = driver
            .execute(&self.statement())
            .map_err(|source| CoreError::Execution {
                table: self.table.clone(),
                operation: self.operation,
                source,
            })?;

        if let Some(key) = &outcome.generated_key {
            self.payload
                .data
                .insert(self.primary_key.clone(), key.clone());
        }
        self.state = CommandState::Executed;
        Ok(outcome)
    }

    /// Marks the command as never to be dispatched.
    pub fn skip(&mut self) {
        if self.state == CommandState::Pending {
            self.state = CommandState::Skipped;
        }
    }

    /// Captures the payload for rollback and flags a scheduled delete.
    pub(crate) fn seal(&mut self, heap: &mut Heap) {
        self.pristine = Some(self.payload.clone());
        if self.operation != Operation::Delete {
            return;
        }
        if let Some(node) = self.owner.as_ref().and_then(|owner| heap.get_mut(owner)) {
            self.prior_status = Some(node.status);
            node.status = NodeStatus::ScheduledDelete;
        }
    }

    /// Writes the outcome into the owner's state record and fields.
    ///
    /// Only executed commands complete; calling it again is a no-op.
    pub fn complete(&mut self, heap: &mut Heap) {
        if self.completed || !self.is_executed() {
            return;
        }
        self.completed = true;
        self.prior_status = None;

        let Some(owner) = &self.owner else {
            return;
        };
        match self.operation {
            Operation::Delete => {
                if let Some(node) = heap.get_mut(owner) {
                    node.status = NodeStatus::Deleted;
                }
            }
            Operation::Insert | Operation::Update => {
                for (column, value) in &self.payload.data {
                    owner.set(column.clone(), value.clone());
                }
                if let Some(node) = heap.get_mut(owner) {
                    node.data.extend(self.payload.data.clone());
                    node.status = NodeStatus::Managed;
                }
            }
        }
    }

    /// Restores the payload captured at seal time and the owner's status.
    ///
    /// The driver transaction is rolled back separately.
    pub fn roll_back(&mut self, heap: &mut Heap) {
        if let Some(pristine) = &self.pristine {
            self.payload = pristine.clone();
        }
        self.state = CommandState::Pending;
        self.completed = false;

        if let (Some(owner), Some(prior)) = (&self.owner, self.prior_status.take()) {
            if let Some(node) = heap.get_mut(owner) {
                node.status = prior;
            }
        }
    }
}

impl fmt::Display for AtomicCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operation, self.table)?;
        if !self.payload.waits.is_empty() {
            let keys: Vec<&str> = self.payload.waits.keys().map(String::as_str).collect();
            write!(f, " waiting for {}", keys.join(", "))?;
        }
        Ok(())
    }
}
