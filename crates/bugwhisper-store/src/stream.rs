//! Append-only log stream with persisted consumer checkpoints.
//!
//! Entries get monotonically increasing integer ids and are never removed.
//! Readers pass the last id they processed; `0` reads from the beginning.

use std::collections::BTreeMap;

use bugwhisper_core::{Error, Result};
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::sqlite::{db_err, now_millis, SqliteStore};
use crate::types::StreamEntry;

impl SqliteStore {
    /// Append an entry to `stream`. Returns its id.
    pub fn xadd(&self, stream: &str, fields: &BTreeMap<String, String>) -> Result<i64> {
        let fields_json = serde_json::to_string(fields)?;
        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO stream_entries (stream, fields_json, created_at) VALUES (?1, ?2, ?3)",
            )
            .map_err(db_err)?
            .insert(params![stream, fields_json, now_millis()])
            .map_err(db_err)?;
        debug!("xadd {} -> {}", stream, id);
        Ok(id)
    }

    /// Up to `count` entries of `stream` with id greater than `after_id`, oldest first.
    pub fn read_after(&self, stream: &str, after_id: i64, count: usize) -> Result<Vec<StreamEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, stream, fields_json, created_at FROM stream_entries \
                 WHERE stream = ?1 AND id > ?2 ORDER BY id LIMIT ?3",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![stream, after_id, count as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, stream, fields_json, created_at) = row.map_err(db_err)?;
            let fields: BTreeMap<String, String> = serde_json::from_str(&fields_json)
                .map_err(|e| Error::Stream(format!("entry {} has corrupt fields: {}", id, e)))?;
            entries.push(StreamEntry {
                id,
                stream,
                fields,
                created_at,
            });
        }
        Ok(entries)
    }

    /// Number of entries in `stream`.
    pub fn stream_len(&self, stream: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM stream_entries WHERE stream = ?1",
            params![stream],
            |row| row.get(0),
        )
        .map_err(db_err)
    }

    /// Last id processed by `consumer` on `stream`, or 0 if it never checkpointed.
    pub fn load_checkpoint(&self, consumer: &str, stream: &str) -> Result<i64> {
        let conn = self.conn.lock();
        let last_id: Option<i64> = conn
            .prepare_cached(
                "SELECT last_id FROM stream_checkpoints WHERE consumer = ?1 AND stream = ?2",
            )
            .map_err(db_err)?
            .query_row(params![consumer, stream], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        Ok(last_id.unwrap_or(0))
    }

    pub fn save_checkpoint(&self, consumer: &str, stream: &str, last_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO stream_checkpoints (consumer, stream, last_id, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(consumer, stream) DO UPDATE SET last_id = excluded.last_id, \
             updated_at = excluded.updated_at",
            params![consumer, stream, last_id, now_millis()],
        )
        .map_err(db_err)?;
        Ok(())
    }
}
