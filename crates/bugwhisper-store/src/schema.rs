//! Database schema SQL.

/// Bug memory: one row per record keyed `bug:{n}`, plus the ordered key list.
pub const MEMORY_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS counters (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS bugs (
    key TEXT PRIMARY KEY,
    error TEXT NOT NULL,
    suggestion TEXT NOT NULL,
    severity TEXT NOT NULL,
    embedding TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bugs_fingerprint ON bugs(fingerprint);

CREATE TABLE IF NOT EXISTS bug_index (
    position INTEGER PRIMARY KEY AUTOINCREMENT,
    bug_key TEXT NOT NULL REFERENCES bugs(key)
);
"#;

/// Append-only log stream and per-consumer cursors.
pub const STREAM_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS stream_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stream TEXT NOT NULL,
    fields_json TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_stream_entries_stream ON stream_entries(stream, id);

CREATE TABLE IF NOT EXISTS stream_checkpoints (
    consumer TEXT NOT NULL,
    stream TEXT NOT NULL,
    last_id INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (consumer, stream)
);
"#;
