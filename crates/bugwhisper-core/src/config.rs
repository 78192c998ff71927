//! Configuration and data directory management.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default similarity threshold shared by every lookup site.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.8;

/// Embedding dimension of all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Paths to all Bug Whisperer data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Bug memory + log stream database directory (`data/memory/`).
    pub memory: PathBuf,
    /// Embedding model files (`data/models/`).
    pub models: PathBuf,
    /// LLM configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            memory: root.join("memory"),
            models: root.join("models"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        std::fs::create_dir_all(&paths.memory)?;
        Ok(paths)
    }
}

/// How the bug memory picks a match among records above the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// First record in insertion order at or above the threshold.
    #[default]
    First,
    /// Highest-similarity record at or above the threshold.
    Best,
}

impl FromStr for MatchStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "best" => Ok(Self::Best),
            other => Err(Error::Config(format!("unknown match strategy: {}", other))),
        }
    }
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Best => write!(f, "best"),
        }
    }
}

/// Top-level Bug Whisperer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugWhisperConfig {
    /// Dashboard HTTP port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Embedding dimension (384 for all-MiniLM-L6-v2).
    pub embedding_dim: usize,
    /// Cosine similarity at or above which a stored bug counts as a match.
    pub similarity_threshold: f32,
    pub match_strategy: MatchStrategy,
    /// Name of the log stream the consumer and producer share.
    pub stream_name: String,
    /// Checkpoint name for the consumer cursor.
    pub consumer_name: String,
    /// Sleep between empty stream reads, in milliseconds.
    pub poll_interval_ms: u64,
    /// Number of reports on the dashboard's recent list.
    pub recent_limit: usize,
    /// Delay between demo errors emitted by the producer, in milliseconds.
    pub producer_interval_ms: u64,
}

impl BugWhisperConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::from_lookup(data_dir, |key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(data_dir: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_or(&lookup, "PORT", 8501u16)?;

        let similarity_threshold =
            parse_or(&lookup, "BUGWHISPER_SIMILARITY_THRESHOLD", DEFAULT_SIMILARITY_THRESHOLD)?;
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(Error::Config(format!(
                "BUGWHISPER_SIMILARITY_THRESHOLD must be within [0, 1], got {}",
                similarity_threshold
            )));
        }

        let match_strategy = match lookup("BUGWHISPER_MATCH_STRATEGY") {
            Some(s) => s.parse()?,
            None => MatchStrategy::default(),
        };

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            data_paths,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            similarity_threshold,
            match_strategy,
            stream_name: lookup("BUGWHISPER_STREAM").unwrap_or_else(|| "bug_logs".into()),
            consumer_name: lookup("BUGWHISPER_CONSUMER").unwrap_or_else(|| "consumer".into()),
            poll_interval_ms: parse_or(&lookup, "BUGWHISPER_POLL_MS", 500u64)?,
            recent_limit: parse_or(&lookup, "BUGWHISPER_RECENT_LIMIT", 10usize)?,
            producer_interval_ms: parse_or(&lookup, "BUGWHISPER_PRODUCER_INTERVAL_MS", 2000u64)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid {}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}
