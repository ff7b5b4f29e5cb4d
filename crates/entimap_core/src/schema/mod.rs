//! Schema and relation metadata.
//!
//! The schema describes, per role, the table, its columns and primary key,
//! and the relations the unit of work follows when it walks a graph.

mod entity;
mod registry;
mod relation;

pub use entity::EntitySchema;
pub use registry::Schema;
pub use relation::{RelationKind, RelationSchema, ThroughSchema};
