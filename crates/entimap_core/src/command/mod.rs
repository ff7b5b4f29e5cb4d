//! Commands and the context carrier protocol.
//!
//! A run produces a [`CommandGraph`]: atomic table writes assembled by
//! composites (`Sequence`, `Conditional`, `Nil`) and connected by
//! [`ContextLink`]s. A link carries a value, usually a generated key, from
//! the command that produces it to a command waiting for it.

mod atomic;
mod composite;
mod context;
mod graph;

pub use atomic::{AtomicCommand, CommandState};
pub use composite::{Command, Condition};
pub use context::{ContextLink, Stream, Wait};
pub use graph::CommandGraph;
