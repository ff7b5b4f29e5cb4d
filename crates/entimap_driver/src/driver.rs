//! Driver trait definition.

use crate::error::DriverResult;
use crate::statement::{ExecOutcome, Statement};

/// A database driver for entimap.
///
/// Drivers are **statement executors**. They receive fully resolved
/// [`Statement`]s and apply them to the backing store. The persistence core
/// owns ordering, key propagation and identity tracking - drivers never
/// see placeholders.
///
/// # Invariants
///
/// - `execute` applies exactly one statement or fails without effect
/// - `execute` reports a generated key for inserts that relied on one
/// - `rollback` discards every statement executed since `begin`
/// - Drivers must be `Send + Sync` so an `Orm` can move across threads
///
/// # Implementors
///
/// - [`super::InMemoryDriver`] - For testing
pub trait Driver: Send + Sync {
    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already open or the driver
    /// cannot start one.
    fn begin(&mut self) -> DriverResult<()>;

    /// Commits the open transaction.
    ///
    /// After this returns successfully, every statement executed since
    /// `begin` is durable and visible.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open or the commit fails.
    fn commit(&mut self) -> DriverResult<()>;

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open.
    fn rollback(&mut self) -> DriverResult<()>;

    /// Executes a single write statement.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The target table does not exist
    /// - A constraint (not-null, unique, primary key) is violated
    /// - The driver fails to apply the write
    fn execute(&mut self, statement: &Statement) -> DriverResult<ExecOutcome>;
}
