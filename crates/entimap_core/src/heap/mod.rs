//! Identity map and entity state records.

mod identity;
mod node;
mod visited;

pub use identity::Heap;
pub use node::{Node, NodeStatus, RelationSnapshot};
pub use visited::Visited;
