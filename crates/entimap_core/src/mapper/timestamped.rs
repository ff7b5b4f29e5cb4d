//! Mapper maintaining creation and update timestamps.

use super::{DefaultMapper, Mapper};
use crate::command::{Command, Stream};
use crate::error::CoreResult;
use crate::heap::Node;
use crate::schema::EntitySchema;
use chrono::Utc;
use entimap_driver::{Operation, Row};

/// A [`DefaultMapper`] that stamps `created_at` and `updated_at`.
///
/// Inserts receive both columns unless the entity already set them.
/// Updates receive a fresh `updated_at`. Unchanged entities still produce
/// no command, so a second run over them issues no write. Columns the
/// schema does not map are left alone.
#[derive(Debug, Clone)]
pub struct TimestampedMapper {
    created_at: String,
    updated_at: String,
}

impl TimestampedMapper {
    /// Creates a mapper using `created_at` and `updated_at`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_columns("created_at", "updated_at")
    }

    /// Creates a mapper using custom column names.
    pub fn with_columns(created_at: impl Into<String>, updated_at: impl Into<String>) -> Self {
        Self {
            created_at: created_at.into(),
            updated_at: updated_at.into(),
        }
    }
}

impl Default for TimestampedMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Mapper for TimestampedMapper {
    fn build_command(
        &self,
        schema: &EntitySchema,
        node: &Node,
        current: &Row,
        diff: &Row,
    ) -> CoreResult<Command> {
        let mut command = DefaultMapper.build_command(schema, node, current, diff)?;
        let Some(atomic) = command.as_atomic_mut() else {
            return Ok(command);
        };

        let now = Utc::now();
        match atomic.operation() {
            Operation::Insert => {
                if schema.has_column(&self.created_at) {
                    atomic.register(self.created_at.clone(), now, false, Stream::Data);
                }
                if schema.has_column(&self.updated_at) {
                    atomic.register(self.updated_at.clone(), now, false, Stream::Data);
                }
            }
            Operation::Update => {
                if schema.has_column(&self.updated_at) {
                    atomic.register(self.updated_at.clone(), now, true, Stream::Data);
                }
            }
            Operation::Delete => {}
        }
        Ok(command)
    }

    fn build_delete_command(&self, schema: &EntitySchema, node: &Node) -> CoreResult<Command> {
        DefaultMapper.build_delete_command(schema, node)
    }
}
