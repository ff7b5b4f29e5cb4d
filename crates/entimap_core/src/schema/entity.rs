//! Entity definitions.

use super::RelationSchema;

/// Table mapping of one entity role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    /// Role name.
    pub role: String,
    /// Table name.
    pub table: String,
    /// Primary key column.
    pub primary_key: String,
    /// Mapped columns, primary key included.
    pub columns: Vec<String>,
    /// Relations, in traversal order.
    pub relations: Vec<RelationSchema>,
}

impl EntitySchema {
    /// Creates an entity mapped to `table` with a single primary key column.
    pub fn new(
        role: impl Into<String>,
        table: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        let primary_key = primary_key.into();
        Self {
            role: role.into(),
            table: table.into(),
            columns: vec![primary_key.clone()],
            primary_key,
            relations: Vec::new(),
        }
    }

    /// Adds columns.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            let column = column.into();
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }
        self
    }

    /// Adds a relation.
    #[must_use]
    pub fn relation(mut self, relation: RelationSchema) -> Self {
        self.relations.push(relation);
        self
    }

    /// Returns whether a column is mapped.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Returns a relation by name.
    #[must_use]
    pub fn find_relation(&self, name: &str) -> Option<&RelationSchema> {
        self.relations.iter().find(|r| r.name == name)
    }
}
