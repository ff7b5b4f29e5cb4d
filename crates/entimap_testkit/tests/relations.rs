//! Integration tests for relation handling.

use entimap_core::{CoreError, NodeStatus, RelationValue};
use entimap_driver::{Operation, TableDef, Value};
use entimap_testkit::prelude::*;

#[test]
fn belongs_to_inserts_parent_first() {
    let mut blog = TestOrm::blog();
    let author = user("ada@example.com");
    let entry = post("hello");
    entry.set_one("user", Some(author.clone()));

    blog.persist(&entry).unwrap();

    assert_operations(&blog.driver, &["INSERT users", "INSERT posts"]);
    assert_eq!(entry.get("user_id"), author.get("id"));
    assert!(!author.get("id").is_null());
}

#[test]
fn required_parent_must_be_present() {
    let mut blog = TestOrm::blog();
    let entry = post("orphan");
    entry.set_one("user", None);

    let err = blog.persist(&entry).unwrap_err();

    assert!(matches!(
        err,
        CoreError::MissingParentContext { ref role, ref relation } if role == "post" && relation == "user"
    ));
    assert!(blog.driver.journal().is_empty());
}

#[test]
fn both_sides_loaded_write_each_row_once() {
    let mut blog = TestOrm::blog();
    let author = user("ada@example.com");
    let entry = post("hello");
    author.push("posts", entry.clone());
    entry.set_one("user", Some(author.clone()));

    blog.persist(&entry).unwrap();

    assert_operations(&blog.driver, &["INSERT users", "INSERT posts"]);
    assert_eq!(entry.get("user_id"), Value::Integer(1));
}

#[test]
fn nested_children_receive_keys_through_levels() {
    let mut blog = TestOrm::blog();
    let author = user("ada@example.com");
    let entry = post("hello");
    entry.push("comments", comment("first"));
    entry.push("comments", comment("second"));
    author.push("posts", entry.clone());
    author.set_one("profile", Some(profile("writes things")));

    let summary = blog.persist(&author).unwrap();

    assert_eq!(summary.inserted, 5);
    assert_eq!(blog.driver.find("comments", "post_id", &entry.get("id")).len(), 2);
    assert_eq!(blog.driver.find("profiles", "user_id", &author.get("id")).len(), 1);
}

#[test]
fn removed_child_is_deleted() {
    let mut blog = TestOrm::blog();
    let author = scenarios::author_with_posts("ada@example.com", 2);
    blog.persist(&author).unwrap();
    blog.driver.clear_journal();

    let dropped = author.relation("posts").targets()[0].clone();
    assert!(author.remove("posts", &dropped));
    blog.persist(&author).unwrap();

    assert_operations(&blog.driver, &["DELETE posts"]);
    assert_eq!(blog.status(&dropped), Some(NodeStatus::Deleted));
    assert_eq!(blog.driver.row_count("posts"), 1);
}

#[test]
fn moved_child_is_updated_not_deleted() {
    let mut blog = TestOrm::blog();
    let first = scenarios::author_with_posts("a@example.com", 1);
    let second = scenarios::author_with_posts("b@example.com", 0);
    blog.unit_of_work(|uow| {
        uow.persist(&first).persist(&second);
        Ok(())
    })
    .unwrap();
    blog.driver.clear_journal();

    let moved = first.relation("posts").targets()[0].clone();
    first.remove("posts", &moved);
    second.push("posts", moved.clone());
    blog.unit_of_work(|uow| {
        uow.persist(&first).persist(&second);
        Ok(())
    })
    .unwrap();

    assert_operations(&blog.driver, &["UPDATE posts"]);
    assert_eq!(moved.get("user_id"), second.get("id"));
    assert_eq!(blog.status(&moved), Some(NodeStatus::Managed));
}

#[test]
fn many_to_many_writes_pivot_after_both_ends() {
    let mut blog = TestOrm::blog();
    let author = scenarios::tagged_user("ada@example.com", &["rust", "orm"]);

    let summary = blog.persist(&author).unwrap();

    assert_eq!(summary.inserted, 5);
    let journal = operations(&blog.driver);
    let user_at = journal.iter().position(|op| op == "INSERT users").unwrap();
    for (i, op) in journal.iter().enumerate() {
        if op == "INSERT tag_user_map" {
            assert!(i > user_at);
            assert_eq!(journal[i - 1], "INSERT tags");
        }
    }

    let pivots = blog.driver.rows("tag_user_map");
    assert_eq!(pivots.len(), 2);
    for pivot in &pivots {
        assert_eq!(pivot["user_id"], author.get("id"));
        assert!(!pivot["tag_id"].is_null());
    }

    match author.relation("tags") {
        RelationValue::Pivoted(collection) => {
            assert!(collection.entries().iter().all(|e| e.pivot.is_some()));
        }
        other => panic!("unexpected relation value: {other:?}"),
    }
}

#[test]
fn unlinking_deletes_only_the_pivot() {
    let mut blog = TestOrm::blog();
    let author = scenarios::tagged_user("ada@example.com", &["rust", "orm"]);
    blog.persist(&author).unwrap();
    blog.driver.clear_journal();

    let rust = author.relation("tags").targets()[0].clone();
    assert!(author.remove("tags", &rust));
    blog.persist(&author).unwrap();

    assert_operations(&blog.driver, &["DELETE tag_user_map"]);
    assert_eq!(blog.driver.row_count("tags"), 2);
    assert_eq!(blog.driver.row_count("tag_user_map"), 1);
    assert_eq!(blog.status(&rust), Some(NodeStatus::Managed));
}

#[test]
fn shared_tag_gets_one_pivot_per_user() {
    let mut blog = TestOrm::blog();
    let shared = tag("shared");
    let first = user("a@example.com");
    let second = user("b@example.com");
    first.link("tags", shared.clone(), None);
    second.link("tags", shared.clone(), None);

    let summary = blog
        .unit_of_work(|uow| {
            uow.persist(&first).persist(&second);
            Ok(())
        })
        .unwrap();

    assert_eq!(summary.inserted, 5);
    assert_eq!(count_ops(&blog.driver, Operation::Insert, "tags"), 1);
    assert_eq!(blog.driver.row_count("tag_user_map"), 2);
}

#[test]
fn morphed_child_receives_owner_role() {
    let mut blog = TestOrm::blog();
    let author = user("ada@example.com");
    author.set_one("avatar", Some(image("ada.png")));

    blog.persist(&author).unwrap();

    let images = blog.driver.rows("images");
    assert_eq!(images.len(), 1);
    assert_eq!(images[0]["parent_id"], author.get("id"));
    assert_eq!(images[0]["parent_type"], Value::from("user"));
}

#[test]
fn morphed_parent_is_written_first() {
    let mut blog = TestOrm::blog();
    let author = user("ada@example.com");
    let avatar = image("ada.png");
    avatar.set_one("parent", Some(author.clone()));

    blog.persist(&avatar).unwrap();

    assert_operations(&blog.driver, &["INSERT users", "INSERT images"]);
    assert_eq!(avatar.get("parent_type"), Value::from("user"));
    assert_eq!(avatar.get("parent_id"), author.get("id"));
}

#[test]
fn nullable_child_is_detached_instead_of_deleted() {
    let mut blog = TestOrm::blog();
    let author = user("ada@example.com");
    let avatar = image("ada.png");
    author.set_one("avatar", Some(avatar.clone()));
    blog.persist(&author).unwrap();
    blog.driver.clear_journal();

    author.set_one("avatar", None);
    blog.persist(&author).unwrap();

    assert_operations(&blog.driver, &["UPDATE images"]);
    assert!(avatar.get("parent_id").is_null());
    assert!(avatar.get("parent_type").is_null());
    assert_eq!(blog.status(&avatar), Some(NodeStatus::Managed));
}

#[test]
fn replaced_profile_deletes_old_before_inserting_new() {
    let mut blog = TestOrm::blog();
    let author = user("ada@example.com");
    let old = profile("old");
    author.set_one("profile", Some(old.clone()));
    blog.persist(&author).unwrap();
    blog.driver.clear_journal();

    let new = profile("new");
    author.set_one("profile", Some(new.clone()));
    blog.persist(&author).unwrap();

    assert_operations(&blog.driver, &["DELETE profiles", "INSERT profiles"]);
    assert_eq!(blog.status(&old), Some(NodeStatus::Deleted));
    assert_eq!(new.get("user_id"), author.get("id"));
    assert_eq!(blog.driver.row_count("profiles"), 1);
}

#[test]
fn replaced_avatar_is_detached_before_new_one_is_inserted() {
    let mut blog = TestOrm::blog();
    blog.driver
        .create_table(TableDef::new("images", "id").unique(["parent_id"]));
    let author = user("ada@example.com");
    let old = image("old.png");
    author.set_one("avatar", Some(old.clone()));
    blog.persist(&author).unwrap();
    blog.driver.clear_journal();

    let new = image("new.png");
    author.set_one("avatar", Some(new.clone()));
    blog.persist(&author).unwrap();

    assert_operations(&blog.driver, &["UPDATE images", "INSERT images"]);
    assert!(old.get("parent_id").is_null());
    assert_eq!(blog.status(&old), Some(NodeStatus::Managed));
    assert_eq!(new.get("parent_id"), author.get("id"));
    assert_eq!(blog.driver.row_count("images"), 2);
}

#[test]
fn replaced_child_under_unique_key_is_deleted_first() {
    let mut blog = TestOrm::blog();
    blog.driver.create_table(
        TableDef::new("posts", "id")
            .not_null(["user_id", "title"])
            .unique(["user_id"]),
    );
    let author = scenarios::author_with_posts("ada@example.com", 1);
    blog.persist(&author).unwrap();
    blog.driver.clear_journal();

    let old = author.relation("posts").targets()[0].clone();
    assert!(author.remove("posts", &old));
    author.push("posts", post("replacement"));
    blog.persist(&author).unwrap();

    assert_operations(&blog.driver, &["DELETE posts", "INSERT posts"]);
    assert_eq!(blog.status(&old), Some(NodeStatus::Deleted));
    let rows = blog.driver.rows("posts");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["title"], Value::from("replacement"));
}

#[test]
fn refers_to_cycle_is_closed_by_update() {
    let mut blog = TestOrm::blog();
    let author = user("ada@example.com");
    let latest = post("latest");
    author.push("posts", latest.clone());
    latest.set_one("user", Some(author.clone()));
    author.set_one("last_post", Some(latest.clone()));

    blog.persist(&author).unwrap();

    assert_operations(&blog.driver, &["INSERT users", "INSERT posts", "UPDATE users"]);
    assert_eq!(author.get("last_post_id"), latest.get("id"));
    let rows = blog.driver.rows("users");
    assert_eq!(rows[0]["last_post_id"], latest.get("id"));

    blog.driver.clear_journal();
    let summary = blog.persist(&author).unwrap();
    assert_eq!(summary.writes(), 0);
}

#[test]
fn refers_to_saved_target_is_written_inline() {
    let mut blog = TestOrm::blog();
    let author = blog.load("user", "users", row(&[("email", "a@example.com".into())]));
    let existing = blog.load(
        "post",
        "posts",
        row(&[("user_id", Value::Integer(1)), ("title", "old".into())]),
    );

    author.set_one("last_post", Some(existing.clone()));
    blog.persist(&author).unwrap();

    assert_operations(&blog.driver, &["UPDATE users"]);
    let journal = journal_entries(&blog.driver);
    assert_eq!(journal[0].values["last_post_id"], serde_json::json!(1));
}

#[test]
fn delete_removes_pivots_before_owner() {
    let mut blog = TestOrm::blog();
    let author = scenarios::tagged_user("ada@example.com", &["rust"]);
    blog.persist(&author).unwrap();
    blog.driver.clear_journal();

    blog.delete(&author).unwrap();

    assert_operations(&blog.driver, &["DELETE tag_user_map", "DELETE users"]);
    assert_eq!(blog.driver.row_count("tags"), 1);
}
