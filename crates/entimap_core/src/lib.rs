//! # entimap core
//!
//! Unit of Work persistence for the entimap data mapper.
//!
//! This crate turns in-memory entity graphs into an ordered series of table
//! writes. It provides:
//! - An identity map ([`Heap`]) holding one state record per tracked entity
//! - Atomic and composite commands connected by context links
//! - Relation-aware command graph construction
//! - A transaction engine that executes the graph in passes, propagates
//!   generated keys and rolls everything back on failure
//!
//! ## Design Principles
//!
//! - Entities are shared handles; identity is the handle, not the key
//! - Mappers return commands and never talk to the driver
//! - A run is all-or-nothing, in the database and in the identity map
//! - A second run over unchanged entities writes nothing
//!
//! ## Example
//!
//! ```rust
//! use entimap_core::{EntityHandle, EntitySchema, Orm, RelationSchema, Schema};
//! use entimap_driver::{InMemoryDriver, TableDef, Value};
//!
//! let driver = InMemoryDriver::new();
//! driver.create_table(TableDef::new("users", "id"));
//! driver.create_table(TableDef::new("posts", "id"));
//!
//! let schema = Schema::new()
//!     .with(
//!         EntitySchema::new("user", "users", "id")
//!             .columns(["email"])
//!             .relation(RelationSchema::has_many("posts", "post", "id", "user_id")),
//!     )
//!     .with(EntitySchema::new("post", "posts", "id").columns(["user_id", "title"]));
//! let mut orm = Orm::new(schema, driver.clone()).unwrap();
//!
//! let user = EntityHandle::new("user").with("email", "ada@example.com");
//! user.push("posts", EntityHandle::new("post").with("title", "hello"));
//! user.push("posts", EntityHandle::new("post").with("title", "again"));
//!
//! let summary = orm.unit_of_work(|uow| {
//!     uow.persist(&user);
//!     Ok(())
//! }).unwrap();
//!
//! assert_eq!(summary.inserted, 3);
//! assert_eq!(driver.find("posts", "user_id", &Value::Integer(1)).len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod config;
mod entity;
mod error;
mod heap;
mod mapper;
mod orm;
mod relation;
mod schema;
mod transaction;
mod types;

pub use command::{
    AtomicCommand, Command, CommandGraph, CommandState, Condition, ContextLink, Stream, Wait,
};
pub use config::Config;
pub use entity::{EntityHandle, InstanceId, PivotedCollection, PivotedEntry, RelationValue};
pub use error::{CoreError, CoreResult};
pub use heap::{Heap, Node, NodeStatus, RelationSnapshot, Visited};
pub use mapper::{DefaultMapper, Mapper, MapperRegistry, TimestampedMapper};
pub use orm::Orm;
pub use schema::{EntitySchema, RelationKind, RelationSchema, Schema, ThroughSchema};
pub use transaction::Transaction;
pub use types::{CommandId, Phase, RunSummary};
