//! Data types for bug records, lookups and stream entries.

use std::collections::BTreeMap;

use bugwhisper_core::Severity;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// A stored bug: the error, its explanation, and the embedding it was matched by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugRecord {
    /// Unique key, `bug:{n}`.
    pub key: String,
    pub error: String,
    pub suggestion: String,
    pub severity: Severity,
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,
    /// SHA-256 hex of `error`.
    pub fingerprint: String,
    pub created_at: i64,
}

/// A record about to be appended.
#[derive(Debug, Clone)]
pub struct NewBug {
    pub error: String,
    pub suggestion: String,
    pub severity: Severity,
    pub embedding: Array1<f32>,
}

impl NewBug {
    pub fn new(
        error: impl Into<String>,
        suggestion: impl Into<String>,
        severity: Severity,
        embedding: Array1<f32>,
    ) -> Self {
        Self {
            error: error.into(),
            suggestion: suggestion.into(),
            severity,
            embedding,
        }
    }
}

/// A lookup hit together with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarBug {
    pub record: BugRecord,
    pub similarity: f32,
}

/// Result of an atomic check-and-append.
#[derive(Debug, Clone)]
pub enum AppendOutcome {
    /// No matching record existed; this one was stored.
    Inserted(BugRecord),
    /// A matching record already existed; nothing was written.
    Existing(SimilarBug),
}

impl AppendOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, AppendOutcome::Inserted(_))
    }
}

/// One entry of the log stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEntry {
    /// Monotonically increasing id.
    pub id: i64,
    pub stream: String,
    pub fields: BTreeMap<String, String>,
    pub created_at: i64,
}

impl StreamEntry {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_bugs: i64,
    pub stream_entries: i64,
    pub embedding_dimension: usize,
    pub db_path: String,
    pub db_size_mb: f64,
    pub matrix_rows: usize,
}
