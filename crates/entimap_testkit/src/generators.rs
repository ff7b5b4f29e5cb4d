//! Property-based test generators using proptest.
//!
//! Provides strategies for generating entity graphs over the blog schema
//! that satisfy its table constraints.

use crate::fixtures::{comment, post, profile, tag, user};
use entimap_core::{EntityHandle, RelationValue};
use proptest::prelude::*;

/// Shape of a generated post.
#[derive(Debug, Clone)]
pub struct PostShape {
    /// Post title.
    pub title: String,
    /// Comment bodies.
    pub comments: Vec<String>,
}

/// Shape of a generated user graph.
#[derive(Debug, Clone)]
pub struct BlogShape {
    /// User email.
    pub email: String,
    /// Profile bio, if the user has a profile.
    pub profile: Option<String>,
    /// Posts of the user.
    pub posts: Vec<PostShape>,
    /// Names of the tags linked to the user, all distinct.
    pub tags: Vec<String>,
}

impl BlogShape {
    /// Builds the entity graph with every relation loaded.
    pub fn build(&self) -> EntityHandle {
        let author = user(&self.email);
        author.set_one("profile", self.profile.as_deref().map(profile));

        let posts = self
            .posts
            .iter()
            .map(|shape| {
                let entity = post(&shape.title);
                let comments = shape.comments.iter().map(|body| comment(body)).collect();
                entity.set_relation("comments", RelationValue::Many(comments));
                entity
            })
            .collect();
        author.set_relation("posts", RelationValue::Many(posts));

        for name in &self.tags {
            author.link("tags", tag(name), None);
        }
        author
    }

    /// Number of rows the first persist of [`build`](Self::build) inserts.
    pub fn row_count(&self) -> usize {
        let comments: usize = self.posts.iter().map(|p| p.comments.len()).sum();
        // a tag row and a pivot row per tag
        1 + usize::from(self.profile.is_some()) + self.posts.len() + comments + 2 * self.tags.len()
    }
}

/// Strategy for generating email addresses.
pub fn email_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,12}@[a-z]{1,8}\\.(com|org|net)").expect("Invalid regex")
}

/// Strategy for generating short human-readable text.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,23}").expect("Invalid regex")
}

/// Strategy for generating posts with a few comments.
pub fn post_shape_strategy() -> impl Strategy<Value = PostShape> {
    (text_strategy(), prop::collection::vec(text_strategy(), 0..4))
        .prop_map(|(title, comments)| PostShape { title, comments })
}

/// Strategy for generating whole user graphs.
pub fn blog_shape_strategy() -> impl Strategy<Value = BlogShape> {
    (
        email_strategy(),
        prop::option::of(text_strategy()),
        prop::collection::vec(post_shape_strategy(), 0..5),
        prop::collection::btree_set("[a-z]{2,10}", 0..4),
    )
        .prop_map(|(email, profile, posts, tags)| BlogShape {
            email,
            profile,
            posts,
            tags: tags.into_iter().collect(),
        })
}
