//! # entimap testkit
//!
//! Test utilities for entimap.
//!
//! This crate provides:
//! - A blog-shaped fixture schema with tables on the in-memory driver
//! - Journal helpers for asserting the statements a run issued
//! - Property-based entity graph generators using proptest
//! - Opt-in tracing output for tests
//!
//! ## Usage
//!
//! ```rust
//! use entimap_testkit::prelude::*;
//!
//! let mut blog = TestOrm::blog();
//! let user = user("ada@example.com");
//! blog.persist(&user).unwrap();
//! assert_eq!(operations(&blog.driver), vec!["INSERT users"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;

static TRACING: Once = Once::new();

/// Installs a test subscriber once per process.
///
/// The filter is read from `RUST_LOG` and defaults to `warn`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        // another harness may already own the global subscriber
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
