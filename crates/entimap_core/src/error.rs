//! Error types for entimap core.

use crate::entity::InstanceId;
use entimap_driver::{DriverError, Operation};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building or executing a unit of work.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entity instance was registered twice in one identity map.
    #[error("entity {instance} ({role}) is already registered")]
    DuplicateRegistration {
        /// The instance that was already present.
        instance: InstanceId,
        /// Role of the instance.
        role: String,
    },

    /// A relation required a parent link but none was present.
    #[error("relation {role}.{relation} requires a parent but none is set")]
    MissingParentContext {
        /// Role owning the relation.
        role: String,
        /// Relation name.
        relation: String,
    },

    /// A required context value never resolved.
    #[error("required context {key} for {table} can never be resolved")]
    RequiredContextUnresolved {
        /// Table of the waiting command.
        table: String,
        /// The unresolved key.
        key: String,
    },

    /// The driver rejected a write.
    #[error("{operation} on {table} failed: {source}")]
    Execution {
        /// Table of the failed command.
        table: String,
        /// Operation of the failed command.
        operation: Operation,
        /// The driver error.
        #[source]
        source: DriverError,
    },

    /// No pending command became ready during a full pass.
    #[error("command graph deadlock: {} commands pending ({})", pending.len(), pending.join(", "))]
    GraphDeadlock {
        /// Descriptions of the commands still pending.
        pending: Vec<String>,
    },

    /// A transaction primitive failed.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// The schema has no entity for the role.
    #[error("unknown role: {role}")]
    UnknownRole {
        /// The requested role.
        role: String,
    },

    /// The schema is inconsistent.
    #[error("invalid schema for {role}: {message}")]
    InvalidSchema {
        /// Role the problem was found in.
        role: String,
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// A command was dispatched while still waiting for context.
    #[error("{operation} on {table} dispatched before ready (waiting for {})", waiting.join(", "))]
    CommandNotReady {
        /// Table of the command.
        table: String,
        /// Operation of the command.
        operation: Operation,
        /// Keys still outstanding.
        waiting: Vec<String>,
    },

    /// The graph exceeds `Config::max_commands`.
    #[error("command graph has {commands} commands, limit is {limit}")]
    GraphTooLarge {
        /// Number of atomic commands built.
        commands: usize,
        /// Configured limit.
        limit: usize,
    },
}

impl CoreError {
    /// Creates a missing parent context error.
    pub fn missing_parent(role: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::MissingParentContext {
            role: role.into(),
            relation: relation.into(),
        }
    }

    /// Creates a required context unresolved error.
    pub fn unresolved(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::RequiredContextUnresolved {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Creates an unknown role error.
    pub fn unknown_role(role: impl Into<String>) -> Self {
        Self::UnknownRole { role: role.into() }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(role: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            role: role.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns whether the error was raised by the driver during execution.
    #[must_use]
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }
}
