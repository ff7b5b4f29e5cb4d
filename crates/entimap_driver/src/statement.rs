//! Write statements dispatched to a driver.

use crate::value::{Row, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of table write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Insert a new row.
    Insert,
    /// Update rows matching a scope.
    Update,
    /// Delete rows matching a scope.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A fully resolved table write.
///
/// `values` is the column payload (VALUES for inserts, SET for updates) and
/// `scope` the equality criteria (WHERE) for updates and deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Target table.
    pub table: String,
    /// Kind of write.
    pub operation: Operation,
    /// Column payload.
    pub values: Row,
    /// Row selection criteria.
    pub scope: Row,
    /// Primary key column of the table, used to report generated keys.
    pub primary_key: Option<String>,
}

impl Statement {
    /// Creates an insert statement.
    pub fn insert(table: impl Into<String>, primary_key: impl Into<String>, values: Row) -> Self {
        Self {
            table: table.into(),
            operation: Operation::Insert,
            values,
            scope: Row::new(),
            primary_key: Some(primary_key.into()),
        }
    }

    /// Creates an update statement.
    pub fn update(table: impl Into<String>, values: Row, scope: Row) -> Self {
        Self {
            table: table.into(),
            operation: Operation::Update,
            values,
            scope,
            primary_key: None,
        }
    }

    /// Creates a delete statement.
    pub fn delete(table: impl Into<String>, scope: Row) -> Self {
        Self {
            table: table.into(),
            operation: Operation::Delete,
            values: Row::new(),
            scope,
            primary_key: None,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operation, self.table)?;
        if !self.values.is_empty() {
            let cols: Vec<String> = self
                .values
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, " ({})", cols.join(", "))?;
        }
        if !self.scope.is_empty() {
            let cols: Vec<String> = self
                .scope
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, " WHERE {}", cols.join(" AND "))?;
        }
        Ok(())
    }
}

/// Result of executing one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutcome {
    /// Key generated by the driver for an insert, if any.
    pub generated_key: Option<Value>,
    /// Number of rows affected.
    pub affected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_values_and_scope() {
        let mut values = Row::new();
        values.insert("email".into(), Value::from("a@b.c"));
        let mut scope = Row::new();
        scope.insert("id".into(), Value::Integer(3));

        let stmt = Statement::update("user", values, scope);
        assert_eq!(stmt.to_string(), "UPDATE user (email='a@b.c') WHERE id=3");
    }

    #[test]
    fn delete_has_no_values() {
        let mut scope = Row::new();
        scope.insert("id".into(), Value::Integer(1));
        let stmt = Statement::delete("tag", scope);
        assert!(stmt.values.is_empty());
        assert_eq!(stmt.operation, Operation::Delete);
    }
}
