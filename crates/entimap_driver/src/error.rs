//! Error types for driver operations.

use crate::statement::Operation;
use thiserror::Error;

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors that can occur while executing statements.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    /// The statement targets a table the driver does not know.
    #[error("unknown table: {table}")]
    UnknownTable {
        /// The requested table.
        table: String,
    },

    /// A table constraint rejected the write.
    #[error("constraint violation on {table}: {message}")]
    ConstraintViolation {
        /// Table the write was aimed at.
        table: String,
        /// Description of the violated constraint.
        message: String,
    },

    /// The statement is malformed (e.g. an update without a scope).
    #[error("invalid statement for {table}: {message}")]
    InvalidStatement {
        /// Table the write was aimed at.
        table: String,
        /// Description of the problem.
        message: String,
    },

    /// A transaction primitive was called in the wrong state.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A failure injected by a test fault rule.
    #[error("injected failure on {operation} {table}")]
    Injected {
        /// Table of the failed statement.
        table: String,
        /// Operation of the failed statement.
        operation: Operation,
    },

    /// The connection is gone.
    #[error("driver connection lost: {0}")]
    Connection(String),
}

impl DriverError {
    /// Creates a constraint violation error.
    pub fn constraint(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid statement error.
    pub fn invalid_statement(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidStatement {
            table: table.into(),
            message: message.into(),
        }
    }
}
