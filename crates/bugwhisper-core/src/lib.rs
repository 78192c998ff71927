//! Bug Whisperer Core: configuration, error taxonomy, shared types.

pub mod config;
pub mod error;
pub mod types;

pub use config::{BugWhisperConfig, DataPaths, MatchStrategy};
pub use error::{Error, Result};
pub use types::Severity;
