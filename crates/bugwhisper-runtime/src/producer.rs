//! Demo producer: writes a fixed sequence of errors to the log stream.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bugwhisper_core::{BugWhisperConfig, Result};
use bugwhisper_store::SqliteStore;
use tracing::debug;

pub const DEMO_ERRORS: [&str; 4] = [
    "NameError: name 'x' is not defined",
    "SyntaxError: unexpected EOF while parsing",
    "ConnectionError: Failed to connect to database",
    "ZeroDivisionError: division by zero",
];

pub struct Producer {
    store: Arc<SqliteStore>,
    stream: String,
    interval: Duration,
}

impl Producer {
    pub fn new(store: Arc<SqliteStore>, stream: impl Into<String>, interval: Duration) -> Self {
        Self {
            store,
            stream: stream.into(),
            interval,
        }
    }

    pub fn from_config(config: &BugWhisperConfig, store: Arc<SqliteStore>) -> Self {
        Self::new(
            store,
            config.stream_name.clone(),
            Duration::from_millis(config.producer_interval_ms),
        )
    }

    /// Send every demo error, pausing `interval` between them. Returns the
    /// stream ids in send order.
    pub async fn run(&self) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(DEMO_ERRORS.len());
        for (i, error) in DEMO_ERRORS.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.interval).await;
            }
            let fields = BTreeMap::from([("error".to_string(), error.to_string())]);
            let id = self.store.xadd(&self.stream, &fields)?;
            debug!("Produced entry {} on {}", id, self.stream);
            println!("Sent: {}", error);
            ids.push(id);
        }
        Ok(ids)
    }
}
