//! Unit of work runs.
//!
//! A run goes through three steps:
//!
//! 1. **Build**: the scheduled entities and their loaded relations become a
//!    command graph whose context links carry generated keys.
//! 2. **Execute**: ready commands are dispatched in passes inside one
//!    driver transaction.
//! 3. **Finish**: on success the state records take the written values; on
//!    failure the driver rolls back and every record is restored.

pub(crate) mod builder;
mod executor;
mod unit;

pub use unit::Transaction;
