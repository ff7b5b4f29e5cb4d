//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use entimap_core::EntityHandle;
use entimap_testkit::{comment, post, tag, user};
use rand::Rng;

/// Generate a random lowercase word of the given length.
pub fn random_word(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

/// Generate a new user with `posts` posts of up to `max_comments` comments
/// each.
pub fn generate_author(posts: usize, max_comments: usize) -> EntityHandle {
    let mut rng = rand::thread_rng();
    let author = user(&format!("{}@example.com", random_word(12)));
    for _ in 0..posts {
        let entry = post(&random_word(16));
        for _ in 0..rng.gen_range(0..=max_comments) {
            entry.push("comments", comment(&random_word(24)));
        }
        author.push("posts", entry);
    }
    author
}

/// Generate a new user linked to `count` new tags with distinct names.
pub fn generate_tagged_author(count: usize) -> EntityHandle {
    let author = user(&format!("{}@example.com", random_word(12)));
    for i in 0..count {
        author.link("tags", tag(&format!("{}-{i}", random_word(6))), None);
    }
    author
}

/// Generate a batch of independent new users.
pub fn generate_users(count: usize) -> Vec<EntityHandle> {
    (0..count)
        .map(|i| user(&format!("{}-{i}@example.com", random_word(8))))
        .collect()
}
