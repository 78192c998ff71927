//! Connectivity check against the bug memory store.

use std::path::Path;

use bugwhisper_core::Result;
use bugwhisper_store::SqliteStore;

/// Open the store under `db_dir` and check that it answers a trivial query.
pub fn ping(db_dir: &Path, embedding_dim: usize) -> Result<bool> {
    let store = SqliteStore::open(db_dir, embedding_dim)?;
    store.ping()
}
