//! Bug Whisperer Store: SQLite bug memory with cosine lookup, plus the
//! append-only log stream and consumer checkpoints.

pub mod schema;
pub mod similarity;
pub mod sqlite;
pub mod stream;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::*;
