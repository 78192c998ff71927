//! SQLite-backed bug memory with linear cosine lookup.
//!
//! Records live in `bugs` under `bug:{n}` keys; `bug_index` is the ordered key
//! list. Normalized embeddings are mirrored in memory in insertion order and
//! topped up from `bug_index` before every lookup, so rows written by another
//! process are seen as well.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bugwhisper_core::{Error, MatchStrategy, Result, Severity};
use ndarray::{Array1, Array2, Axis};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::schema::{MEMORY_SCHEMA_SQL, STREAM_SCHEMA_SQL};
use crate::similarity::{
    cosine_similarity, decode_embedding, encode_embedding, meets_threshold, normalize,
};
use crate::types::*;

const DB_FILE_NAME: &str = "bugwhisper.db";

/// SQLite store holding the bug memory and the log stream.
pub struct SqliteStore {
    pub(crate) conn: Mutex<Connection>,
    db_path: PathBuf,
    embedding_dim: usize,
    embedding_matrix: Mutex<EmbeddingMatrix>,
}

struct EmbeddingMatrix {
    /// Normalized embeddings in insertion order, shape (N, dim).
    matrix: Array2<f32>,
    /// Bug keys corresponding to each row.
    keys: Vec<String>,
    /// Highest `bug_index.position` already loaded.
    last_position: i64,
}

pub(crate) fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// SHA-256 hex digest of the error text.
pub fn fingerprint(error: &str) -> String {
    hex::encode(Sha256::digest(error.as_bytes()))
}

impl SqliteStore {
    /// Open or create the store.
    ///
    /// `db_dir` is the directory (e.g., `data/memory/`). The file will be `db_dir/bugwhisper.db`.
    pub fn open(db_dir: impl AsRef<Path>, embedding_dim: usize) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join(DB_FILE_NAME);

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
            embedding_dim,
            embedding_matrix: Mutex::new(EmbeddingMatrix {
                matrix: Array2::zeros((0, embedding_dim)),
                keys: Vec::new(),
                last_position: 0,
            }),
        };

        {
            let conn = store.conn.lock();
            store.refresh_matrix(&conn)?;
        }

        info!(
            "SqliteStore initialized: {} bugs, dim={}, path={}",
            store.count()?,
            embedding_dim,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        // Consumer and dashboard may run as separate processes on the same file.
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let full_schema = format!("{}\n{}", MEMORY_SCHEMA_SQL, STREAM_SCHEMA_SQL);
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Liveness check: runs `SELECT 1`.
    pub fn ping(&self) -> Result<bool> {
        let conn = self.conn.lock();
        let one: i64 = conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(one == 1)
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// First record, in insertion order, whose similarity to `query` is at
    /// least `threshold`. Later records are not considered once one qualifies.
    pub fn find_similar(&self, query: &Array1<f32>, threshold: f32) -> Result<Option<SimilarBug>> {
        self.find_match(query, threshold, MatchStrategy::First)
    }

    /// Highest-similarity record at or above `threshold`.
    pub fn find_best(&self, query: &Array1<f32>, threshold: f32) -> Result<Option<SimilarBug>> {
        self.find_match(query, threshold, MatchStrategy::Best)
    }

    pub fn find_match(
        &self,
        query: &Array1<f32>,
        threshold: f32,
        strategy: MatchStrategy,
    ) -> Result<Option<SimilarBug>> {
        self.check_dimension(query.len())?;
        let conn = self.conn.lock();
        self.lookup(&conn, query, threshold, strategy)
    }

    fn lookup(
        &self,
        conn: &Connection,
        query: &Array1<f32>,
        threshold: f32,
        strategy: MatchStrategy,
    ) -> Result<Option<SimilarBug>> {
        self.refresh_matrix(conn)?;

        let hit = {
            let mat = self.embedding_matrix.lock();
            if mat.matrix.nrows() == 0 {
                return Ok(None);
            }
            let q = normalize(query.view());
            let similarities = mat.matrix.dot(&q);
            let mut qualifying = similarities
                .iter()
                .enumerate()
                .map(|(i, &s)| (i, s.clamp(-1.0, 1.0)))
                .filter(|&(_, s)| meets_threshold(s, threshold));

            let chosen = match strategy {
                MatchStrategy::First => qualifying.next(),
                MatchStrategy::Best => qualifying.fold(None, |best: Option<(usize, f32)>, cur| {
                    match best {
                        Some(b) if b.1 >= cur.1 => Some(b),
                        _ => Some(cur),
                    }
                }),
            };
            chosen.map(|(i, s)| (mat.keys[i].clone(), s))
        };

        match hit {
            Some((key, similarity)) => {
                let record = Self::get_locked(conn, &key)?
                    .ok_or_else(|| Error::NotFound(format!("indexed bug {} has no record", key)))?;
                debug!("Memory hit {} (similarity={:.3})", key, similarity);
                Ok(Some(SimilarBug { record, similarity }))
            }
            None => Ok(None),
        }
    }

    /// Load `bug_index` rows newer than the in-memory matrix.
    fn refresh_matrix(&self, conn: &Connection) -> Result<()> {
        let last_position = self.embedding_matrix.lock().last_position;

        let mut stmt = conn
            .prepare_cached(
                "SELECT bi.position, b.key, b.embedding \
                 FROM bug_index bi JOIN bugs b ON b.key = bi.bug_key \
                 WHERE bi.position > ?1 ORDER BY bi.position",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![last_position], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(db_err)?;

        let mut mat = self.embedding_matrix.lock();
        let mut loaded = 0usize;
        for row in rows {
            let (position, key, json) = row.map_err(db_err)?;
            mat.last_position = position;

            let embedding = Array1::from_vec(decode_embedding(&json)?);
            if embedding.len() != self.embedding_dim {
                warn!(
                    "Skipping {}: embedding has {} dims, expected {}",
                    key,
                    embedding.len(),
                    self.embedding_dim
                );
                continue;
            }
            let normalized = normalize(embedding.view());
            mat.matrix
                .push(Axis(0), normalized.view())
                .map_err(|e| Error::Internal(format!("Matrix append failed: {}", e)))?;
            mat.keys.push(key);
            loaded += 1;
        }
        if loaded > 0 {
            debug!("Loaded {} embeddings into matrix ({} rows)", loaded, mat.keys.len());
        }
        Ok(())
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.embedding_dim {
            return Err(Error::DimensionMismatch {
                expected: self.embedding_dim,
                actual,
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Append
    // ---------------------------------------------------------------

    /// Store a record unconditionally. Returns the stored record.
    pub fn append(&self, bug: &NewBug) -> Result<BugRecord> {
        self.check_dimension(bug.embedding.len())?;
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;
        let record = Self::insert_locked(&tx, bug)?;
        tx.commit().map_err(db_err)?;
        debug!("Appended {}", record.key);
        Ok(record)
    }

    /// Atomic check-and-append.
    ///
    /// Under a write transaction, returns the existing record if one has the
    /// same error fingerprint or an embedding within `threshold`; otherwise
    /// stores `bug`.
    pub fn append_if_absent(
        &self,
        bug: &NewBug,
        threshold: f32,
        strategy: MatchStrategy,
    ) -> Result<AppendOutcome> {
        self.check_dimension(bug.embedding.len())?;
        let fp = fingerprint(&bug.error);

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;

        if let Some(record) = Self::find_by_fingerprint(&tx, &fp)? {
            let stored = Array1::from_vec(record.embedding.clone());
            let similarity = if stored.len() == bug.embedding.len() {
                cosine_similarity(stored.view(), bug.embedding.view())
            } else {
                0.0
            };
            return Ok(AppendOutcome::Existing(SimilarBug { record, similarity }));
        }

        if let Some(hit) = self.lookup(&tx, &bug.embedding, threshold, strategy)? {
            return Ok(AppendOutcome::Existing(hit));
        }

        let record = Self::insert_locked(&tx, bug)?;
        tx.commit().map_err(db_err)?;
        debug!("Appended {} after miss", record.key);
        Ok(AppendOutcome::Inserted(record))
    }

    fn insert_locked(conn: &Connection, bug: &NewBug) -> Result<BugRecord> {
        let n: i64 = conn
            .query_row(
                "INSERT INTO counters (name, value) VALUES ('bug_counter', 1) \
                 ON CONFLICT(name) DO UPDATE SET value = value + 1 \
                 RETURNING value",
                [],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        let key = format!("bug:{}", n);
        let embedding_json = encode_embedding(&bug.embedding)?;
        let fp = fingerprint(&bug.error);
        let created_at = now_millis();

        conn.prepare_cached(
            "INSERT INTO bugs (key, error, suggestion, severity, embedding, fingerprint, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(db_err)?
        .execute(params![
            key,
            bug.error,
            bug.suggestion,
            bug.severity.as_str(),
            embedding_json,
            fp,
            created_at,
        ])
        .map_err(db_err)?;

        conn.prepare_cached("INSERT INTO bug_index (bug_key) VALUES (?1)")
            .map_err(db_err)?
            .execute(params![key])
            .map_err(db_err)?;

        Ok(BugRecord {
            key,
            error: bug.error.clone(),
            suggestion: bug.suggestion.clone(),
            severity: bug.severity,
            embedding: bug.embedding.to_vec(),
            fingerprint: fp,
            created_at,
        })
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// The last `n` records, most recent first.
    pub fn list_recent(&self, n: usize) -> Result<Vec<BugRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT b.* FROM bug_index bi JOIN bugs b ON b.key = bi.bug_key \
                 ORDER BY bi.position DESC LIMIT ?1",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![n as i64], Self::row_to_bug)
            .map_err(db_err)?;
        rows.map(|r| r.map_err(db_err)).collect()
    }

    pub fn get(&self, key: &str) -> Result<Option<BugRecord>> {
        let conn = self.conn.lock();
        Self::get_locked(&conn, key)
    }

    fn get_locked(conn: &Connection, key: &str) -> Result<Option<BugRecord>> {
        conn.prepare_cached("SELECT * FROM bugs WHERE key = ?1")
            .map_err(db_err)?
            .query_row(params![key], Self::row_to_bug)
            .optional()
            .map_err(db_err)
    }

    fn find_by_fingerprint(conn: &Connection, fp: &str) -> Result<Option<BugRecord>> {
        conn.prepare_cached(
            "SELECT b.* FROM bug_index bi JOIN bugs b ON b.key = bi.bug_key \
             WHERE b.fingerprint = ?1 ORDER BY bi.position LIMIT 1",
        )
        .map_err(db_err)?
        .query_row(params![fp], Self::row_to_bug)
        .optional()
        .map_err(db_err)
    }

    /// Number of indexed records.
    pub fn count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM bug_index", [], |row| row.get(0))
            .map_err(db_err)
    }

    pub fn get_stats(&self) -> Result<StoreStats> {
        let total_bugs = self.count()?;
        let stream_entries: i64 = {
            let conn = self.conn.lock();
            conn.query_row("SELECT COUNT(*) FROM stream_entries", [], |row| row.get(0))
                .map_err(db_err)?
        };

        let db_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);
        let matrix_rows = self.embedding_matrix.lock().keys.len();

        Ok(StoreStats {
            total_bugs,
            stream_entries,
            embedding_dimension: self.embedding_dim,
            db_path: self.db_path.display().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
            matrix_rows,
        })
    }

    fn row_to_bug(row: &rusqlite::Row<'_>) -> rusqlite::Result<BugRecord> {
        let severity: String = row.get("severity")?;
        let severity = severity.parse::<Severity>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let embedding: String = row.get("embedding")?;
        let embedding = decode_embedding(&embedding).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(BugRecord {
            key: row.get("key")?,
            error: row.get("error")?,
            suggestion: row.get("suggestion")?,
            severity,
            embedding,
            fingerprint: row.get("fingerprint")?,
            created_at: row.get("created_at")?,
        })
    }
}
