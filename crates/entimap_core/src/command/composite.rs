//! Command sum type and composite conditions.

use super::AtomicCommand;
use crate::entity::EntityHandle;
use crate::types::CommandId;

/// A predicate guarding a conditional command.
#[derive(Debug, Clone)]
pub enum Condition {
    /// The entity has a persisted row (its record is managed with a key).
    Persisted {
        /// The entity to check.
        entity: EntityHandle,
        /// Its primary key column.
        primary_key: String,
    },
    /// The command has finished and its context holds a non-null `key`.
    ///
    /// Undecided until the command is finalized.
    HasContext {
        /// The producing command.
        command: CommandId,
        /// The context key.
        key: String,
    },
}

/// A node of the command graph.
///
/// Composites reference their children by [`CommandId`]; they never
/// execute anything themselves. A composite is ready and executed when all
/// its children are.
#[derive(Debug, Clone, Default)]
pub enum Command {
    /// A single table write.
    Atomic(AtomicCommand),
    /// Children in cascade order.
    Sequence(Vec<CommandId>),
    /// A child executed only if the condition holds when evaluated.
    Conditional {
        /// The guard.
        condition: Condition,
        /// The guarded command.
        inner: CommandId,
        /// The outcome, once evaluated.
        decision: Option<bool>,
    },
    /// No-op. Always ready and always executed.
    #[default]
    Nil,
}

impl Command {
    /// Returns whether this is the no-op command.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Command::Nil)
    }

    /// Returns the atomic command, if this is one.
    #[must_use]
    pub fn as_atomic(&self) -> Option<&AtomicCommand> {
        match self {
            Command::Atomic(command) => Some(command),
            _ => None,
        }
    }

    /// Returns the atomic command mutably, if this is one.
    pub fn as_atomic_mut(&mut self) -> Option<&mut AtomicCommand> {
        match self {
            Command::Atomic(command) => Some(command),
            _ => None,
        }
    }

    /// Returns the ids of the direct children.
    #[must_use]
    pub fn children(&self) -> Vec<CommandId> {
        match self {
            Command::Sequence(children) => children.clone(),
            Command::Conditional { inner, .. } => vec![*inner],
            Command::Atomic(_) | Command::Nil => Vec::new(),
        }
    }
}

impl From<AtomicCommand> for Command {
    fn from(command: AtomicCommand) -> Self {
        Command::Atomic(command)
    }
}
