//! # entimap driver
//!
//! The database driver seam for entimap.
//!
//! This crate is the lowest layer of the persistence stack. A driver
//! executes already-resolved table writes inside a transaction; it knows
//! nothing about entities, relations or command graphs.
//!
//! ## Design Principles
//!
//! - A [`Statement`] is a single table write with literal values only
//! - Drivers report generated keys, never interpret them
//! - Transaction boundaries are explicit (`begin`/`commit`/`rollback`)
//! - Drivers must be `Send + Sync`
//!
//! ## Available Drivers
//!
//! - [`InMemoryDriver`] - table store for tests, benches and ephemeral use
//!
//! ## Example
//!
//! ```rust
//! use entimap_driver::{Driver, InMemoryDriver, Row, Statement, TableDef, Value};
//!
//! let mut driver = InMemoryDriver::new();
//! driver.create_table(TableDef::new("user", "id"));
//!
//! let mut values = Row::new();
//! values.insert("email".to_string(), Value::from("hello@world.com"));
//!
//! let outcome = driver.execute(&Statement::insert("user", "id", values)).unwrap();
//! assert_eq!(outcome.generated_key, Some(Value::Integer(1)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
mod memory;
mod statement;
mod value;

pub use driver::Driver;
pub use error::{DriverError, DriverResult};
pub use memory::{Fault, InMemoryDriver, TableDef};
pub use statement::{ExecOutcome, Operation, Statement};
pub use value::{Row, Value};
