//! Journal helpers for asserting issued statements.
//!
//! The in-memory driver journals every applied statement. These helpers
//! render the journal in forms that are easy to compare in assertions.

use entimap_driver::{InMemoryDriver, Operation, Row, Statement, Value};
use serde::Serialize;
use serde_json::json;

/// One journaled statement in a comparison-friendly shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalEntry {
    /// `INSERT`, `UPDATE` or `DELETE`.
    pub operation: String,
    /// Target table.
    pub table: String,
    /// Written values.
    pub values: serde_json::Value,
    /// Row selection of updates and deletes.
    pub scope: serde_json::Value,
}

impl From<&Statement> for JournalEntry {
    fn from(statement: &Statement) -> Self {
        Self {
            operation: statement.operation.to_string(),
            table: statement.table.clone(),
            values: row_to_json(&statement.values),
            scope: row_to_json(&statement.scope),
        }
    }
}

/// Converts a value to plain JSON.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Integer(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::Text(s) => json!(s),
        Value::Bytes(bytes) => json!(bytes),
        Value::Timestamp(ts) => json!(ts.to_rfc3339()),
    }
}

/// Converts a row to a plain JSON object.
pub fn row_to_json(row: &Row) -> serde_json::Value {
    serde_json::Value::Object(
        row.iter()
            .map(|(column, value)| (column.clone(), value_to_json(value)))
            .collect(),
    )
}

/// Returns the journal as entries.
pub fn journal_entries(driver: &InMemoryDriver) -> Vec<JournalEntry> {
    driver.journal().iter().map(JournalEntry::from).collect()
}

/// Returns the journal as a JSON array.
pub fn journal_json(driver: &InMemoryDriver) -> serde_json::Value {
    serde_json::to_value(journal_entries(driver)).unwrap_or_default()
}

/// Returns `"<OPERATION> <table>"` for every journaled statement.
pub fn operations(driver: &InMemoryDriver) -> Vec<String> {
    driver
        .journal()
        .iter()
        .map(|s| format!("{} {}", s.operation, s.table))
        .collect()
}

/// Returns how many journaled statements match an operation and table.
pub fn count_ops(driver: &InMemoryDriver, operation: Operation, table: &str) -> usize {
    driver
        .journal()
        .iter()
        .filter(|s| s.operation == operation && s.table == table)
        .count()
}

/// Returns the journal position of the first statement matching an
/// operation and a predicate on its values or scope.
pub fn position_of<F>(driver: &InMemoryDriver, operation: Operation, table: &str, f: F) -> Option<usize>
where
    F: Fn(&Statement) -> bool,
{
    driver
        .journal()
        .iter()
        .position(|s| s.operation == operation && s.table == table && f(s))
}

/// Asserts that the journal is exactly `expected` (`"<OP> <table>"` form).
pub fn assert_operations(driver: &InMemoryDriver, expected: &[&str]) {
    let actual = operations(driver);
    assert_eq!(
        actual, expected,
        "journal mismatch:\n{}",
        serde_json::to_string_pretty(&journal_json(driver)).unwrap_or_default()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use entimap_driver::{Driver, TableDef};

    #[test]
    fn renders_statements_as_plain_json() {
        let mut driver = InMemoryDriver::new();
        driver.create_table(TableDef::new("users", "id"));
        let mut values = Row::new();
        values.insert("email".into(), Value::from("a@b.c"));
        values.insert("nickname".into(), Value::Null);
        driver
            .execute(&Statement::insert("users", "id", values))
            .unwrap();

        assert_eq!(
            journal_json(&driver),
            json!([{
                "operation": "INSERT",
                "table": "users",
                "values": {"email": "a@b.c", "nickname": null},
                "scope": {}
            }])
        );
        assert_operations(&driver, &["INSERT users"]);
        assert_eq!(count_ops(&driver, Operation::Insert, "users"), 1);
    }
}
