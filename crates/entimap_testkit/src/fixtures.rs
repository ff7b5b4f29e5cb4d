//! Test fixtures and ORM helpers.
//!
//! Provides a blog-shaped schema covering every relation kind, the
//! matching tables on an [`InMemoryDriver`], and entity constructors.

use entimap_core::{
    Config, CoreResult, EntityHandle, EntitySchema, Orm, RelationKind, RelationSchema,
    RunSummary, Schema, ThroughSchema,
};
use entimap_driver::{InMemoryDriver, Row, TableDef, Value};

/// Builds the blog schema.
///
/// | role           | table          | relations                                      |
/// |----------------|----------------|------------------------------------------------|
/// | `user`         | `users`        | profile, posts, tags, avatar, last_post        |
/// | `profile`      | `profiles`     |                                                |
/// | `post`         | `posts`        | user, comments                                 |
/// | `comment`      | `comments`     |                                                |
/// | `tag`          | `tags`         |                                                |
/// | `tag_user_map` | `tag_user_map` |                                                |
/// | `image`        | `images`       | parent (morphed)                               |
pub fn blog_schema() -> Schema {
    Schema::new()
        .with(
            EntitySchema::new("user", "users", "id")
                .columns(["email", "last_post_id"])
                .relation(RelationSchema::has_one("profile", "profile", "id", "user_id"))
                .relation(RelationSchema::has_many("posts", "post", "id", "user_id"))
                .relation(RelationSchema::many_to_many(
                    "tags",
                    "tag",
                    "id",
                    "id",
                    ThroughSchema::new("tag_user_map", "user_id", "tag_id"),
                ))
                .relation(
                    RelationSchema::new(
                        "avatar",
                        RelationKind::MorphedHasOne,
                        "image",
                        "id",
                        "parent_id",
                    )
                    .morph_key("parent_type")
                    .nullable(true),
                )
                .relation(RelationSchema::refers_to("last_post", "post", "last_post_id", "id")),
        )
        .with(EntitySchema::new("profile", "profiles", "id").columns(["user_id", "bio"]))
        .with(
            EntitySchema::new("post", "posts", "id")
                .columns(["user_id", "title", "created_at", "updated_at"])
                .relation(RelationSchema::belongs_to("user", "user", "user_id", "id"))
                .relation(RelationSchema::has_many("comments", "comment", "id", "post_id")),
        )
        .with(EntitySchema::new("comment", "comments", "id").columns(["post_id", "body"]))
        .with(EntitySchema::new("tag", "tags", "id").columns(["name"]))
        .with(EntitySchema::new("tag_user_map", "tag_user_map", "id").columns(["user_id", "tag_id"]))
        .with(
            EntitySchema::new("image", "images", "id")
                .columns(["parent_id", "parent_type", "url"])
                .relation(
                    RelationSchema::new(
                        "parent",
                        RelationKind::BelongsToMorphed,
                        "",
                        "parent_id",
                        "id",
                    )
                    .morph_key("parent_type"),
                ),
        )
}

/// Creates the blog tables with their constraints.
pub fn create_blog_tables(driver: &InMemoryDriver) {
    driver.create_table(TableDef::new("users", "id").unique(["email"]));
    driver.create_table(
        TableDef::new("profiles", "id")
            .not_null(["user_id"])
            .unique(["user_id"]),
    );
    driver.create_table(TableDef::new("posts", "id").not_null(["user_id", "title"]));
    driver.create_table(TableDef::new("comments", "id").not_null(["post_id"]));
    driver.create_table(TableDef::new("tags", "id").unique(["name"]));
    driver.create_table(TableDef::new("tag_user_map", "id").not_null(["user_id", "tag_id"]));
    driver.create_table(TableDef::new("images", "id"));
}

/// An ORM over the blog schema and a shared in-memory driver.
pub struct TestOrm {
    /// The ORM instance.
    pub orm: Orm<InMemoryDriver>,
    /// A handle on the same tables as the ORM's driver.
    pub driver: InMemoryDriver,
}

impl TestOrm {
    /// Creates a blog ORM with the default configuration.
    pub fn blog() -> Self {
        Self::blog_with(Config::default())
    }

    /// Creates a blog ORM with a custom configuration.
    pub fn blog_with(config: Config) -> Self {
        let driver = InMemoryDriver::new();
        create_blog_tables(&driver);
        let orm = Orm::new(blog_schema(), driver.clone())
            .expect("blog schema should be valid")
            .with_config(config);
        Self { orm, driver }
    }

    /// Persists one entity in its own unit of work.
    pub fn persist(&mut self, entity: &EntityHandle) -> CoreResult<RunSummary> {
        self.orm.unit_of_work(|uow| {
            uow.persist(entity);
            Ok(())
        })
    }

    /// Deletes one entity in its own unit of work.
    pub fn delete(&mut self, entity: &EntityHandle) -> CoreResult<RunSummary> {
        self.orm.unit_of_work(|uow| {
            uow.delete(entity);
            Ok(())
        })
    }

    /// Seeds a row directly and hydrates it as a managed entity.
    pub fn load(&mut self, role: &str, table: &str, row: Row) -> EntityHandle {
        let mut row = row;
        let key = self.driver.seed(table, row.clone()).expect("seed should succeed");
        let primary_key = self
            .orm
            .schema()
            .entity(role)
            .expect("role should be mapped")
            .primary_key
            .clone();
        tracing::debug!(role, table, key = %key, "seeded fixture row");
        row.insert(primary_key, key);
        self.orm.hydrate(role, row).expect("hydrate should succeed")
    }
}

impl std::ops::Deref for TestOrm {
    type Target = Orm<InMemoryDriver>;

    fn deref(&self) -> &Self::Target {
        &self.orm
    }
}

impl std::ops::DerefMut for TestOrm {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.orm
    }
}

/// Runs a test against a fresh blog ORM.
pub fn with_blog_orm<F, R>(f: F) -> R
where
    F: FnOnce(&mut TestOrm) -> R,
{
    let mut blog = TestOrm::blog();
    f(&mut blog)
}

/// Builds a row from column/value pairs.
pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(column, value)| ((*column).to_string(), value.clone()))
        .collect()
}

/// Creates a new user.
pub fn user(email: &str) -> EntityHandle {
    EntityHandle::new("user").with("email", email)
}

/// Creates a new profile.
pub fn profile(bio: &str) -> EntityHandle {
    EntityHandle::new("profile").with("bio", bio)
}

/// Creates a new post.
pub fn post(title: &str) -> EntityHandle {
    EntityHandle::new("post").with("title", title)
}

/// Creates a new comment.
pub fn comment(body: &str) -> EntityHandle {
    EntityHandle::new("comment").with("body", body)
}

/// Creates a new tag.
pub fn tag(name: &str) -> EntityHandle {
    EntityHandle::new("tag").with("name", name)
}

/// Creates a new image.
pub fn image(url: &str) -> EntityHandle {
    EntityHandle::new("image").with("url", url)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A new user with `count` new posts.
    pub fn author_with_posts(email: &str, count: usize) -> EntityHandle {
        let author = user(email);
        author.set_relation("posts", entimap_core::RelationValue::Many(Vec::new()));
        for i in 0..count {
            author.push("posts", post(&format!("post {i}")));
        }
        author
    }

    /// A new user linked to new tags.
    pub fn tagged_user(email: &str, tags: &[&str]) -> EntityHandle {
        let author = user(email);
        for name in tags {
            author.link("tags", tag(name), None);
        }
        author
    }
}
