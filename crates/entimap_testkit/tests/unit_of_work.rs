//! Integration tests for unit of work runs over the blog schema.

use entimap_core::{Config, CoreError, NodeStatus, Phase, RelationValue, TimestampedMapper};
use entimap_driver::{Fault, Operation, Value};
use entimap_testkit::prelude::*;
use serde_json::json;

#[test]
fn parent_is_inserted_before_children() {
    init_tracing();
    let mut blog = TestOrm::blog();
    let author = scenarios::author_with_posts("ada@example.com", 3);

    let summary = blog.persist(&author).unwrap();

    assert_eq!(summary.inserted, 4);
    assert_operations(
        &blog.driver,
        &["INSERT users", "INSERT posts", "INSERT posts", "INSERT posts"],
    );
    let id = author.get("id");
    assert_eq!(id, Value::Integer(1));
    for post in author.relation("posts").targets() {
        assert_eq!(post.get("user_id"), id);
        assert_eq!(blog.status(&post), Some(NodeStatus::Managed));
    }
}

#[test]
fn unchanged_graph_writes_nothing() {
    let mut blog = TestOrm::blog();
    let author = scenarios::author_with_posts("ada@example.com", 2);
    author.link("tags", tag("rust"), None);
    blog.persist(&author).unwrap();
    blog.driver.clear_journal();

    let summary = blog.persist(&author).unwrap();

    assert_eq!(summary.writes(), 0);
    assert!(blog.driver.journal().is_empty());
}

#[test]
fn update_writes_only_changed_columns() {
    let mut blog = TestOrm::blog();
    let author = scenarios::author_with_posts("ada@example.com", 2);
    blog.persist(&author).unwrap();
    blog.driver.clear_journal();

    let second = author.relation("posts").targets()[1].clone();
    second.set("title", "renamed");
    let summary = blog.persist(&author).unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(
        journal_json(&blog.driver),
        json!([{
            "operation": "UPDATE",
            "table": "posts",
            "values": {"title": "renamed"},
            "scope": {"id": 2}
        }])
    );
}

#[test]
fn loaded_entity_update_is_scoped_by_key() {
    let mut blog = TestOrm::blog();
    let loaded = blog.load("user", "users", row(&[("email", "old@example.com".into())]));

    loaded.set("email", "new@example.com");
    blog.persist(&loaded).unwrap();

    let rows = blog.driver.find("users", "id", &loaded.get("id"));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["email"], Value::from("new@example.com"));
}

#[test]
fn delete_cascades_children_first() {
    let mut blog = TestOrm::blog();
    let author = scenarios::author_with_posts("ada@example.com", 3);
    blog.persist(&author).unwrap();
    blog.driver.clear_journal();

    let summary = blog.delete(&author).unwrap();

    assert_eq!(summary.deleted, 4);
    assert_operations(
        &blog.driver,
        &["DELETE posts", "DELETE posts", "DELETE posts", "DELETE users"],
    );
    assert_eq!(blog.driver.row_count("posts"), 0);
    assert_eq!(blog.status(&author), Some(NodeStatus::Deleted));
}

#[test]
fn deleting_an_untracked_entity_is_a_no_op() {
    let mut blog = TestOrm::blog();
    let stranger = user("nobody@example.com");

    let summary = blog.delete(&stranger).unwrap();

    assert_eq!(summary.writes(), 0);
    assert_eq!(summary.skipped, 0);
    assert!(blog.driver.journal().is_empty());
}

#[test]
fn failed_insert_rolls_back_everything() {
    let mut blog = TestOrm::blog();
    let author = scenarios::author_with_posts("ada@example.com", 3);
    blog.driver
        .fail_on(Fault::on_table("posts").operation(Operation::Insert).after(1));

    let err = {
        let mut uow = blog.transaction();
        uow.persist(&author);
        let err = uow.run().unwrap_err();
        assert_eq!(uow.phase(), Phase::RolledBack);
        assert_eq!(uow.scheduled(), 0);
        err
    };

    assert!(err.is_execution());
    assert!(!blog.driver.in_transaction());
    assert_eq!(blog.driver.row_count("users"), 0);
    assert_eq!(blog.driver.row_count("posts"), 0);
    assert!(blog.heap().is_empty());
    assert!(author.get("id").is_null());

    // the fault fired once; a retry succeeds
    let summary = blog.persist(&author).unwrap();
    assert_eq!(summary.inserted, 4);
    assert_eq!(blog.driver.row_count("posts"), 3);
}

#[test]
fn failed_update_keeps_previous_state() {
    let mut blog = TestOrm::blog();
    let loaded = blog.load("user", "users", row(&[("email", "old@example.com".into())]));
    blog.driver
        .fail_on(Fault::on_table("users").operation(Operation::Update));

    loaded.set("email", "new@example.com");
    assert!(blog.persist(&loaded).is_err());

    let node = blog.heap().get(&loaded).unwrap();
    assert_eq!(node.status, NodeStatus::Managed);
    assert_eq!(node.value("email"), Value::from("old@example.com"));

    blog.persist(&loaded).unwrap();
    assert_eq!(
        blog.heap().get(&loaded).unwrap().value("email"),
        Value::from("new@example.com")
    );
}

#[test]
fn failed_delete_restores_managed_status() {
    let mut blog = TestOrm::blog();
    let loaded = blog.load("user", "users", row(&[("email", "a@example.com".into())]));
    blog.driver
        .fail_on(Fault::on_table("users").operation(Operation::Delete));

    let err = blog.delete(&loaded).unwrap_err();

    assert!(err.is_execution());
    assert_eq!(blog.status(&loaded), Some(NodeStatus::Managed));
    assert_eq!(blog.driver.row_count("users"), 1);
}

#[test]
fn delete_wins_over_persist() {
    let mut blog = TestOrm::blog();
    let loaded = blog.load("user", "users", row(&[("email", "a@example.com".into())]));
    loaded.set("email", "b@example.com");

    let summary = blog
        .unit_of_work(|uow| {
            uow.persist(&loaded).delete(&loaded);
            Ok(())
        })
        .unwrap();

    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.updated, 0);
    assert_operations(&blog.driver, &["DELETE users"]);
}

#[test]
fn persisting_a_deleted_entity_inserts_it_again() {
    let mut blog = TestOrm::blog();
    let loaded = blog.load("user", "users", row(&[("email", "a@example.com".into())]));
    blog.delete(&loaded).unwrap();
    assert_eq!(blog.status(&loaded), Some(NodeStatus::Deleted));

    blog.persist(&loaded).unwrap();

    assert_eq!(blog.status(&loaded), Some(NodeStatus::Managed));
    assert_eq!(blog.driver.find("users", "id", &Value::Integer(1)).len(), 1);
    assert_operations(&blog.driver, &["DELETE users", "INSERT users"]);
}

#[test]
fn deleted_entities_are_evicted_when_configured() {
    let mut blog = TestOrm::blog_with(Config::new().evict_deleted(true));
    let loaded = blog.load("user", "users", row(&[("email", "a@example.com".into())]));

    blog.delete(&loaded).unwrap();

    assert_eq!(blog.status(&loaded), None);
    assert!(blog.heap().is_empty());
}

#[test]
fn oversized_graph_is_rejected_before_writing() {
    let mut blog = TestOrm::blog_with(Config::new().max_commands(2));
    let author = scenarios::author_with_posts("ada@example.com", 3);

    let err = blog.persist(&author).unwrap_err();

    assert!(matches!(
        err,
        CoreError::GraphTooLarge {
            commands: 4,
            limit: 2
        }
    ));
    assert!(blog.driver.journal().is_empty());
    assert!(!blog.driver.in_transaction());
}

#[test]
fn empty_run_commits_without_driver_calls() {
    let mut blog = TestOrm::blog();
    let mut uow = blog.transaction();
    assert_eq!(uow.phase(), Phase::Collecting);

    let summary = uow.run().unwrap();

    assert_eq!(summary, Default::default());
    assert_eq!(uow.phase(), Phase::Committed);
}

#[test]
fn closure_error_aborts_before_any_write() {
    let mut blog = TestOrm::blog();
    let author = user("ada@example.com");

    let err = blog
        .unit_of_work(|uow| {
            uow.persist(&author);
            Err(CoreError::invalid_operation("changed my mind"))
        })
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidOperation { .. }));
    assert!(blog.driver.journal().is_empty());
    assert!(blog.heap().is_empty());
}

#[test]
fn timestamps_are_stamped_by_mapper() {
    let driver = entimap_driver::InMemoryDriver::new();
    create_blog_tables(&driver);
    let mut orm = entimap_core::Orm::new(blog_schema(), driver.clone())
        .unwrap()
        .with_mapper("post", TimestampedMapper::new());

    let author = scenarios::author_with_posts("ada@example.com", 1);
    orm.unit_of_work(|uow| {
        uow.persist(&author);
        Ok(())
    })
    .unwrap();

    let post = author.relation("posts").targets()[0].clone();
    let created = post.get("created_at");
    assert!(created.as_timestamp().is_some());
    assert_eq!(post.get("updated_at"), created);

    // unchanged: no update, stamps untouched
    driver.clear_journal();
    orm.unit_of_work(|uow| {
        uow.persist(&author);
        Ok(())
    })
    .unwrap();
    assert!(driver.journal().is_empty());

    post.set("title", "edited");
    orm.unit_of_work(|uow| {
        uow.persist(&author);
        Ok(())
    })
    .unwrap();
    let journal = driver.journal();
    assert_eq!(journal.len(), 1);
    assert!(journal[0].values.contains_key("updated_at"));
    assert!(!journal[0].values.contains_key("created_at"));
    assert_eq!(post.get("created_at"), created);
}

#[test]
fn hydrated_relation_counts_as_persisted() {
    let mut blog = TestOrm::blog();
    let author = blog.load("user", "users", row(&[("email", "a@example.com".into())]));
    let first = blog.load(
        "post",
        "posts",
        row(&[("user_id", Value::Integer(1)), ("title", "first".into())]),
    );
    blog.hydrate_relation(&author, "posts", RelationValue::Many(vec![first.clone()]))
        .unwrap();

    let summary = blog.persist(&author).unwrap();

    assert_eq!(summary.writes(), 0);
    assert!(blog.driver.journal().is_empty());
}
