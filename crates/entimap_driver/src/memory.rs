//! In-memory driver for testing.

use crate::driver::Driver;
use crate::error::{DriverError, DriverResult};
use crate::statement::{ExecOutcome, Operation, Statement};
use crate::value::{Row, Value};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Declaration of an in-memory table.
#[derive(Debug, Clone)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Primary key column.
    pub primary_key: String,
    /// Whether the driver generates the primary key when it is absent.
    pub autoincrement: bool,
    /// Columns that reject NULL.
    pub not_null: Vec<String>,
    /// Columns whose non-null values must be unique.
    pub unique: Vec<String>,
}

impl TableDef {
    /// Creates a table with an autoincrement integer primary key.
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            autoincrement: true,
            not_null: Vec::new(),
            unique: Vec::new(),
        }
    }

    /// Requires callers to supply the primary key.
    #[must_use]
    pub fn manual_keys(mut self) -> Self {
        self.autoincrement = false;
        self
    }

    /// Declares NOT NULL columns.
    #[must_use]
    pub fn not_null<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.not_null.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Declares UNIQUE columns.
    #[must_use]
    pub fn unique<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique.extend(columns.into_iter().map(Into::into));
        self
    }
}

/// A rule that makes a matching statement fail.
///
/// Faults are consumed when they fire. `skip` lets the first matches
/// through, so `Fault::on_table("tag").after(2)` fails the third write to
/// `tag`.
#[derive(Debug, Clone, Default)]
pub struct Fault {
    table: Option<String>,
    operation: Option<Operation>,
    skip: usize,
}

impl Fault {
    /// Matches any statement.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Matches statements on the given table.
    #[must_use]
    pub fn on_table(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..Self::default()
        }
    }

    /// Restricts the rule to one operation.
    #[must_use]
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Lets `count` matching statements pass before failing.
    #[must_use]
    pub fn after(mut self, count: usize) -> Self {
        self.skip = count;
        self
    }

    fn matches(&self, statement: &Statement) -> bool {
        self.table.as_ref().map_or(true, |t| *t == statement.table)
            && self.operation.map_or(true, |op| op == statement.operation)
    }
}

#[derive(Debug, Clone)]
struct Table {
    def: TableDef,
    rows: Vec<Row>,
    next_id: i64,
}

impl Table {
    fn new(def: TableDef) -> Self {
        Self {
            def,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    /// Checks NOT NULL and UNIQUE constraints for `row`, ignoring the row at
    /// `position` (the row being updated).
    fn check(&self, row: &Row, position: Option<usize>) -> DriverResult<()> {
        for column in &self.def.not_null {
            if row.get(column).map_or(true, Value::is_null) {
                return Err(DriverError::constraint(
                    &self.def.name,
                    format!("column {column} may not be NULL"),
                ));
            }
        }

        let unique = std::iter::once(&self.def.primary_key).chain(self.def.unique.iter());
        for column in unique {
            let Some(value) = row.get(column).filter(|v| !v.is_null()) else {
                continue;
            };
            let duplicate = self
                .rows
                .iter()
                .enumerate()
                .any(|(i, other)| Some(i) != position && other.get(column) == Some(value));
            if duplicate {
                return Err(DriverError::constraint(
                    &self.def.name,
                    format!("duplicate value {value} for unique column {column}"),
                ));
            }
        }

        Ok(())
    }

    fn insert(&mut self, statement: &Statement) -> DriverResult<ExecOutcome> {
        let mut row = statement.values.clone();
        let pk = self.def.primary_key.clone();
        let mut generated_key = None;

        match row.get(&pk) {
            None | Some(Value::Null) => {
                if !self.def.autoincrement {
                    return Err(DriverError::constraint(
                        &self.def.name,
                        format!("primary key {pk} is required"),
                    ));
                }
                let key = Value::Integer(self.next_id);
                self.next_id += 1;
                row.insert(pk, key.clone());
                generated_key = Some(key);
            }
            Some(Value::Integer(n)) if *n >= self.next_id => {
                self.next_id = n + 1;
            }
            Some(_) => {}
        }

        self.check(&row, None)?;
        self.rows.push(row);

        Ok(ExecOutcome {
            generated_key,
            affected: 1,
        })
    }

    fn update(&mut self, statement: &Statement) -> DriverResult<ExecOutcome> {
        if statement.scope.is_empty() {
            return Err(DriverError::invalid_statement(
                &self.def.name,
                "update without scope",
            ));
        }

        let mut updated = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            if matches_scope(row, &statement.scope) {
                let mut candidate = row.clone();
                candidate.extend(statement.values.clone());
                self.check(&candidate, Some(i))?;
                updated.push((i, candidate));
            }
        }

        let affected = updated.len() as u64;
        for (i, row) in updated {
            self.rows[i] = row;
        }

        Ok(ExecOutcome {
            generated_key: None,
            affected,
        })
    }

    fn delete(&mut self, statement: &Statement) -> DriverResult<ExecOutcome> {
        if statement.scope.is_empty() {
            return Err(DriverError::invalid_statement(
                &self.def.name,
                "delete without scope",
            ));
        }

        let before = self.rows.len();
        self.rows.retain(|row| !matches_scope(row, &statement.scope));

        Ok(ExecOutcome {
            generated_key: None,
            affected: (before - self.rows.len()) as u64,
        })
    }
}

fn matches_scope(row: &Row, scope: &Row) -> bool {
    scope
        .iter()
        .all(|(column, value)| row.get(column).unwrap_or(&Value::Null) == value)
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Table>,
    /// Table state at `begin`, restored on rollback.
    snapshot: Option<BTreeMap<String, Table>>,
    journal: Vec<Statement>,
    faults: Vec<Fault>,
}

/// An in-memory driver.
///
/// This driver keeps tables in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Benchmarks that should not measure I/O
///
/// Clones share the same tables, so a test can keep a handle while the
/// `Orm` owns another one.
///
/// # Transactions
///
/// `begin` snapshots every table; `rollback` restores the snapshot. The
/// journal records every applied statement, including statements that were
/// later rolled back.
///
/// # Example
///
/// ```rust
/// use entimap_driver::{Driver, InMemoryDriver, Row, Statement, TableDef};
///
/// let mut driver = InMemoryDriver::new();
/// driver.create_table(TableDef::new("tag", "id"));
///
/// driver.begin().unwrap();
/// driver.execute(&Statement::insert("tag", "id", Row::new())).unwrap();
/// driver.rollback().unwrap();
///
/// assert_eq!(driver.row_count("tag"), 0);
/// assert_eq!(driver.write_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryDriver {
    state: Arc<RwLock<State>>,
}

impl InMemoryDriver {
    /// Creates a driver without tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a table. Re-declaring a table drops its rows.
    pub fn create_table(&self, def: TableDef) {
        self.state
            .write()
            .tables
            .insert(def.name.clone(), Table::new(def));
    }

    /// Returns a copy of the rows in `table` (empty if unknown).
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state
            .read()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Returns the number of rows in `table`.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.state.read().tables.get(table).map_or(0, |t| t.rows.len())
    }

    /// Returns the rows of `table` whose `column` equals `value`.
    #[must_use]
    pub fn find(&self, table: &str, column: &str, value: &Value) -> Vec<Row> {
        self.rows(table)
            .into_iter()
            .filter(|row| row.get(column) == Some(value))
            .collect()
    }

    /// Inserts a row directly, bypassing journal and faults.
    ///
    /// Used to seed fixtures that the read path would normally load.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is unknown or a constraint fails.
    pub fn seed(&self, table: &str, row: Row) -> DriverResult<Value> {
        let mut state = self.state.write();
        let target = state
            .tables
            .get_mut(table)
            .ok_or_else(|| DriverError::UnknownTable {
                table: table.to_string(),
            })?;
        let pk = target.def.primary_key.clone();
        let outcome = target.insert(&Statement::insert(table, pk.clone(), row))?;
        let key = match outcome.generated_key {
            Some(key) => key,
            None => target
                .rows
                .last()
                .and_then(|r| r.get(&pk).cloned())
                .unwrap_or(Value::Null),
        };
        Ok(key)
    }

    /// Returns every applied statement, in execution order.
    #[must_use]
    pub fn journal(&self) -> Vec<Statement> {
        self.state.read().journal.clone()
    }

    /// Returns the number of applied statements.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.read().journal.len()
    }

    /// Clears the journal.
    pub fn clear_journal(&self) {
        self.state.write().journal.clear();
    }

    /// Registers a fault rule.
    pub fn fail_on(&self, fault: Fault) {
        self.state.write().faults.push(fault);
    }

    /// Returns whether a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.state.read().snapshot.is_some()
    }
}

impl Driver for InMemoryDriver {
    fn begin(&mut self) -> DriverResult<()> {
        let mut state = self.state.write();
        if state.snapshot.is_some() {
            return Err(DriverError::Transaction(
                "transaction already open".to_string(),
            ));
        }
        state.snapshot = Some(state.tables.clone());
        trace!("transaction opened");
        Ok(())
    }

    fn commit(&mut self) -> DriverResult<()> {
        let mut state = self.state.write();
        match state.snapshot.take() {
            Some(_) => {
                trace!(statements = state.journal.len(), "transaction committed");
                Ok(())
            }
            None => Err(DriverError::Transaction("no open transaction".to_string())),
        }
    }

    fn rollback(&mut self) -> DriverResult<()> {
        let mut state = self.state.write();
        match state.snapshot.take() {
            Some(tables) => {
                state.tables = tables;
                debug!("transaction rolled back");
                Ok(())
            }
            None => Err(DriverError::Transaction("no open transaction".to_string())),
        }
    }

    fn execute(&mut self, statement: &Statement) -> DriverResult<ExecOutcome> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        if let Some(pos) = state.faults.iter().position(|f| f.matches(statement)) {
            let fault = &mut state.faults[pos];
            if fault.skip > 0 {
                fault.skip -= 1;
            } else {
                state.faults.remove(pos);
                debug!(
                    table = %statement.table,
                    operation = ?statement.operation,
                    "injected fault fired"
                );
                return Err(DriverError::Injected {
                    table: statement.table.clone(),
                    operation: statement.operation,
                });
            }
        }

        let table =
            state
                .tables
                .get_mut(&statement.table)
                .ok_or_else(|| DriverError::UnknownTable {
                    table: statement.table.clone(),
                })?;

        let outcome = match statement.operation {
            Operation::Insert => table.insert(statement)?,
            Operation::Update => table.update(statement)?,
            Operation::Delete => table.delete(statement)?,
        };

        debug!(
            table = %statement.table,
            operation = ?statement.operation,
            affected = outcome.affected,
            "statement applied"
        );
        state.journal.push(statement.clone());
        Ok(outcome)
    }
}
