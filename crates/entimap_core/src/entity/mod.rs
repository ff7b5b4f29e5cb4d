//! Entity instances and relation values.

mod handle;
mod id;
mod relation;

pub use handle::EntityHandle;
pub use id::InstanceId;
pub use relation::{PivotedCollection, PivotedEntry, RelationValue};
