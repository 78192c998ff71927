//! Stream consumer: diagnoses every error posted to the log stream.
//!
//! The cursor is the persisted checkpoint, so a restarted consumer resumes
//! after the last entry it handled instead of replaying the stream.

use std::sync::Arc;
use std::time::Duration;

use bugwhisper_core::{BugWhisperConfig, Result};
use bugwhisper_store::{SqliteStore, StreamEntry};
use tracing::{info, warn};

use crate::orchestrator::Orchestrator;

/// Entries fetched per read.
const READ_BATCH: usize = 16;

pub struct Consumer {
    orchestrator: Arc<Orchestrator>,
    stream: String,
    name: String,
    poll_interval: Duration,
}

impl Consumer {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        stream: impl Into<String>,
        name: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            orchestrator,
            stream: stream.into(),
            name: name.into(),
            poll_interval,
        }
    }

    pub fn from_config(config: &BugWhisperConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self::new(
            orchestrator,
            config.stream_name.clone(),
            config.consumer_name.clone(),
            Duration::from_millis(config.poll_interval_ms),
        )
    }

    fn store(&self) -> &SqliteStore {
        self.orchestrator.store()
    }

    /// Run until an orchestrator or store failure, which is returned.
    pub async fn run(&self) -> Result<()> {
        info!(
            "Consumer '{}' listening on '{}' from id {}",
            self.name,
            self.stream,
            self.store().load_checkpoint(&self.name, &self.stream)?
        );
        loop {
            if self.run_once().await? == 0 {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }

    /// Handle every entry currently past the checkpoint. Returns how many
    /// entries were consumed, skipped ones included.
    pub async fn run_once(&self) -> Result<usize> {
        let mut handled = 0;
        loop {
            let cursor = self.store().load_checkpoint(&self.name, &self.stream)?;
            let entries = self.store().read_after(&self.stream, cursor, READ_BATCH)?;
            if entries.is_empty() {
                return Ok(handled);
            }
            for entry in entries {
                self.handle(&entry).await?;
                self.store().save_checkpoint(&self.name, &self.stream, entry.id)?;
                handled += 1;
            }
        }
    }

    async fn handle(&self, entry: &StreamEntry) -> Result<()> {
        let error_text = match entry.field("error").map(str::trim) {
            Some(text) if !text.is_empty() => text,
            Some(_) => {
                warn!("Stream entry {} has a blank 'error' field, skipping", entry.id);
                return Ok(());
            }
            None => {
                warn!("Stream entry {} has no 'error' field, skipping", entry.id);
                return Ok(());
            }
        };
        println!("\nBug detected: {}", error_text);
        let diagnosis = self.orchestrator.diagnose(error_text).await?;
        println!("{}", diagnosis.message());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use bugwhisper_core::Error;

    use crate::orchestrator::tests::{setup, ScriptedExplainer};

    fn error_fields(text: &str) -> BTreeMap<String, String> {
        BTreeMap::from([("error".to_string(), text.to_string())])
    }

    #[tokio::test]
    async fn test_consumes_and_checkpoints() {
        let (_tmp, orch) = setup(Arc::new(ScriptedExplainer::replying("unused")));
        let orch = Arc::new(orch);
        let store = orch.store().clone();
        store.xadd("bug_logs", &error_fields("ZeroDivisionError: division by zero")).unwrap();
        store.xadd("bug_logs", &error_fields("SyntaxError: unexpected EOF while parsing")).unwrap();
        let last = store.xadd("bug_logs", &error_fields("ZeroDivisionError: division by zero")).unwrap();

        let consumer = Consumer::new(orch, "bug_logs", "consumer", Duration::from_millis(10));
        assert_eq!(consumer.run_once().await.unwrap(), 3);
        assert_eq!(store.load_checkpoint("consumer", "bug_logs").unwrap(), last);
        // The repeated error matched memory instead of being stored again.
        assert_eq!(store.count().unwrap(), 2);

        assert_eq!(consumer.run_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_resumes_from_checkpoint() {
        let (_tmp, orch) = setup(Arc::new(ScriptedExplainer::replying("unused")));
        let orch = Arc::new(orch);
        let store = orch.store().clone();
        store.xadd("bug_logs", &error_fields("NameError: name 'x' is not defined")).unwrap();

        let first = Consumer::new(orch.clone(), "bug_logs", "consumer", Duration::ZERO);
        assert_eq!(first.run_once().await.unwrap(), 1);

        store.xadd("bug_logs", &error_fields("ConnectionError: Failed to connect to database")).unwrap();
        let restarted = Consumer::new(orch.clone(), "bug_logs", "consumer", Duration::ZERO);
        assert_eq!(restarted.run_once().await.unwrap(), 1);

        // A consumer under another name starts from the beginning.
        let other = Consumer::new(orch, "bug_logs", "auditor", Duration::ZERO);
        assert_eq!(other.run_once().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_entries_without_error_field_are_skipped() {
        let (_tmp, orch) = setup(Arc::new(ScriptedExplainer::replying("unused")));
        let orch = Arc::new(orch);
        let store = orch.store().clone();
        let id = store
            .xadd("bug_logs", &BTreeMap::from([("message".to_string(), "hi".to_string())]))
            .unwrap();

        let consumer = Consumer::new(orch, "bug_logs", "consumer", Duration::ZERO);
        assert_eq!(consumer.run_once().await.unwrap(), 1);
        assert_eq!(store.load_checkpoint("consumer", "bug_logs").unwrap(), id);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blank_error_does_not_block_later_entries() {
        let (_tmp, orch) = setup(Arc::new(ScriptedExplainer::replying("unused")));
        let orch = Arc::new(orch);
        let store = orch.store().clone();
        store.xadd("bug_logs", &error_fields("   ")).unwrap();
        let last = store.xadd("bug_logs", &error_fields("ZeroDivisionError: division by zero")).unwrap();

        let consumer = Consumer::new(orch, "bug_logs", "consumer", Duration::ZERO);
        assert_eq!(consumer.run_once().await.unwrap(), 2);
        assert_eq!(store.load_checkpoint("consumer", "bug_logs").unwrap(), last);
        assert_eq!(store.count().unwrap(), 1);
        let stored = store.get("bug:1").unwrap().unwrap();
        assert_eq!(stored.error, "ZeroDivisionError: division by zero");
    }

    #[tokio::test]
    async fn test_failure_stops_before_checkpoint() {
        let (_tmp, orch) = setup(Arc::new(ScriptedExplainer::failing("model down")));
        let orch = Arc::new(orch);
        let store = orch.store().clone();
        store.xadd("bug_logs", &error_fields("KeyError: 'id'")).unwrap();

        let consumer = Consumer::new(orch, "bug_logs", "consumer", Duration::ZERO);
        let err = consumer.run().await.unwrap_err();
        assert!(matches!(err, Error::Explain(_)));
        assert_eq!(store.load_checkpoint("consumer", "bug_logs").unwrap(), 0);
    }
}
