//! Plain column mapper.

use super::Mapper;
use crate::command::{AtomicCommand, Command};
use crate::error::CoreResult;
use crate::heap::{Node, NodeStatus};
use crate::schema::EntitySchema;
use entimap_driver::Row;

/// Maps entity fields one-to-one onto columns.
///
/// - `New` records become inserts of every current column (a null primary
///   key is left for the driver to generate)
/// - `Managed` records with a non-empty diff become updates scoped by the
///   primary key
/// - anything else is `Nil`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMapper;

impl Mapper for DefaultMapper {
    fn build_command(
        &self,
        schema: &EntitySchema,
        node: &Node,
        current: &Row,
        diff: &Row,
    ) -> CoreResult<Command> {
        match node.status {
            NodeStatus::New => {
                let mut data = current.clone();
                if data.get(&schema.primary_key).is_some_and(|v| v.is_null()) {
                    data.remove(&schema.primary_key);
                }
                Ok(AtomicCommand::insert(&schema.table, &schema.primary_key, data).into())
            }
            NodeStatus::Managed if !diff.is_empty() => {
                let mut scope = Row::new();
                scope.insert(
                    schema.primary_key.clone(),
                    node.value(&schema.primary_key),
                );
                Ok(
                    AtomicCommand::update(&schema.table, &schema.primary_key, diff.clone(), scope)
                        .into(),
                )
            }
            _ => Ok(Command::Nil),
        }
    }

    fn build_delete_command(&self, schema: &EntitySchema, node: &Node) -> CoreResult<Command> {
        if !node.is_persisted(&schema.primary_key) {
            return Ok(Command::Nil);
        }
        let mut scope = Row::new();
        scope.insert(
            schema.primary_key.clone(),
            node.value(&schema.primary_key),
        );
        Ok(AtomicCommand::delete(&schema.table, &schema.primary_key, scope).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entimap_driver::{Operation, Value};

    fn schema() -> EntitySchema {
        EntitySchema::new("user", "user", "id").columns(["email"])
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn new_record_inserts_without_null_key() {
        let current = row(&[("id", Value::Null), ("email", "a".into())]);
        let command = DefaultMapper
            .build_command(&schema(), &Node::new("user"), &current, &current)
            .unwrap();

        let atomic = command.as_atomic().unwrap();
        assert_eq!(atomic.operation(), Operation::Insert);
        assert!(!atomic.data().contains_key("id"));
    }

    #[test]
    fn managed_record_updates_diff_only() {
        let node = Node::managed("user", row(&[("id", 3.into()), ("email", "a".into())]));
        let current = row(&[("id", 3.into()), ("email", "b".into())]);
        let diff = node.diff(&current);
        let command = DefaultMapper
            .build_command(&schema(), &node, &current, &diff)
            .unwrap();

        let atomic = command.as_atomic().unwrap();
        assert_eq!(atomic.operation(), Operation::Update);
        assert_eq!(atomic.data(), &row(&[("email", "b".into())]));
        assert_eq!(atomic.scope(), &row(&[("id", 3.into())]));
    }

    #[test]
    fn empty_diff_is_nil() {
        let node = Node::managed("user", row(&[("id", 3.into())]));
        let current = row(&[("id", 3.into())]);
        let command = DefaultMapper
            .build_command(&schema(), &node, &current, &Row::new())
            .unwrap();
        assert!(command.is_nil());
    }

    #[test]
    fn delete_of_unpersisted_is_nil() {
        let command = DefaultMapper
            .build_delete_command(&schema(), &Node::new("user"))
            .unwrap();
        assert!(command.is_nil());

        let node = Node::managed("user", row(&[("id", 3.into())]));
        let command = DefaultMapper.build_delete_command(&schema(), &node).unwrap();
        assert_eq!(command.as_atomic().unwrap().operation(), Operation::Delete);
    }
}
