//! Orchestrator: memory lookup, then template, then model, then write-back.

use std::sync::Arc;

use bugwhisper_core::{BugWhisperConfig, Error, MatchStrategy, Result, Severity};
use bugwhisper_explain::Explainer;
use bugwhisper_infer::EmbedderBackend;
use bugwhisper_store::{AppendOutcome, NewBug, SimilarBug, SqliteStore};
use tracing::{debug, info};

use crate::types::{Diagnosis, SuggestionSource};

/// Marker the explainer's output must contain to be used as-is.
pub const FIX_MARKER: &str = "Fix:";

pub fn explain_prompt(error_text: &str) -> String {
    format!("Explain this error and suggest a fix:\nError: {}", error_text)
}

pub fn fallback_suggestion(error_text: &str) -> String {
    format!(
        "Cause: Likely reason for '{}'.\nFix: Please verify configuration, syntax, or logic.",
        error_text
    )
}

/// Coordinates classifier, embedder, store, templates and explainer for one
/// error at a time.
pub struct Orchestrator {
    store: Arc<SqliteStore>,
    embedder: Arc<dyn EmbedderBackend>,
    explainer: Arc<dyn Explainer>,
    threshold: f32,
    strategy: MatchStrategy,
}

impl Orchestrator {
    pub fn new(
        store: Arc<SqliteStore>,
        embedder: Arc<dyn EmbedderBackend>,
        explainer: Arc<dyn Explainer>,
        threshold: f32,
        strategy: MatchStrategy,
    ) -> Self {
        info!(
            "Orchestrator initialized: embedder={}, explainer={}, threshold={}, strategy={}",
            embedder.name(),
            explainer.name(),
            threshold,
            strategy
        );
        Self {
            store,
            embedder,
            explainer,
            threshold,
            strategy,
        }
    }

    /// Build with threshold and strategy taken from config.
    pub fn from_config(
        config: &BugWhisperConfig,
        store: Arc<SqliteStore>,
        embedder: Arc<dyn EmbedderBackend>,
        explainer: Arc<dyn Explainer>,
    ) -> Self {
        Self::new(
            store,
            embedder,
            explainer,
            config.similarity_threshold,
            config.match_strategy,
        )
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbedderBackend> {
        &self.embedder
    }

    pub fn explainer(&self) -> &Arc<dyn Explainer> {
        &self.explainer
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Diagnose one error line.
    ///
    /// Input is trimmed; blank input is rejected before any model call.
    /// Embedding, store and explainer failures propagate.
    pub async fn diagnose(&self, error_text: &str) -> Result<Diagnosis> {
        let error_text = error_text.trim();
        if error_text.is_empty() {
            return Err(Error::InvalidInput("error text is empty".into()));
        }

        let severity = bugwhisper_triage::classify(error_text);
        let embedding = self.embedder.embed(error_text)?;

        if let Some(hit) = self.store.find_match(&embedding, self.threshold, self.strategy)? {
            debug!("Memory hit {} (similarity {:.3})", hit.record.key, hit.similarity);
            return Ok(from_memory(severity, hit));
        }

        let (suggestion, source) = self.suggest(error_text).await?;

        let bug = NewBug::new(error_text, suggestion.clone(), severity, embedding);
        match self.store.append_if_absent(&bug, self.threshold, self.strategy)? {
            AppendOutcome::Inserted(record) => {
                info!("Stored {} ({}, {})", record.key, severity, source);
                Ok(Diagnosis {
                    severity,
                    suggestion,
                    source,
                    key: record.key,
                    similarity: None,
                })
            }
            AppendOutcome::Existing(hit) => {
                debug!("Concurrent writer stored {} first", hit.record.key);
                Ok(from_memory(severity, hit))
            }
        }
    }

    async fn suggest(&self, error_text: &str) -> Result<(String, SuggestionSource)> {
        if let Some(template) = bugwhisper_triage::resolve(error_text) {
            return Ok((template.to_string(), SuggestionSource::Template));
        }

        let raw = self.explainer.explain(&explain_prompt(error_text)).await?;
        let raw = raw.trim();
        if raw.contains(FIX_MARKER) {
            Ok((raw.to_string(), SuggestionSource::Model))
        } else {
            debug!("Explainer output has no {:?}, using fallback", FIX_MARKER);
            Ok((fallback_suggestion(error_text), SuggestionSource::Fallback))
        }
    }
}

fn from_memory(severity: Severity, hit: SimilarBug) -> Diagnosis {
    Diagnosis {
        severity,
        suggestion: hit.record.suggestion,
        source: SuggestionSource::Memory,
        key: hit.record.key,
        similarity: Some(hit.similarity),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use bugwhisper_infer::HashingEmbedder;
    use tempfile::TempDir;

    /// Explainer that replays a fixed reply and counts calls.
    pub(crate) struct ScriptedExplainer {
        reply: std::result::Result<String, String>,
        delay: Duration,
        pub calls: AtomicUsize,
    }

    impl ScriptedExplainer {
        pub fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(msg: &str) -> Self {
            Self {
                reply: Err(msg.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl Explainer for ScriptedExplainer {
        async fn explain(&self, prompt: &str) -> Result<String> {
            assert!(prompt.starts_with("Explain this error and suggest a fix:\nError: "));
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply.clone().map_err(Error::Explain)
        }

        fn is_available(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    pub(crate) fn setup(explainer: Arc<ScriptedExplainer>) -> (TempDir, Orchestrator) {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(tmp.path(), 384).unwrap());
        let embedder: Arc<dyn EmbedderBackend> = Arc::new(HashingEmbedder::new(384));
        let orch = Orchestrator::new(store, embedder, explainer, 0.8, MatchStrategy::First);
        (tmp, orch)
    }

    #[tokio::test]
    async fn test_zero_division_end_to_end() {
        let explainer = Arc::new(ScriptedExplainer::replying("unused"));
        let (_tmp, orch) = setup(explainer.clone());

        let d = orch.diagnose("ZeroDivisionError: division by zero").await.unwrap();
        assert_eq!(d.severity, Severity::Critical);
        assert_eq!(d.suggestion, "Cause: Division by zero.\nFix: Check denominator before dividing.");
        assert_eq!(d.source, SuggestionSource::Template);
        assert_eq!(d.key, "bug:1");
        assert_eq!(orch.store().count().unwrap(), 1);
        assert_eq!(explainer.calls.load(Ordering::SeqCst), 0);

        let stored = orch.store().get("bug:1").unwrap().unwrap();
        assert_eq!(stored.error, "ZeroDivisionError: division by zero");
        assert_eq!(stored.severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_repeat_error_comes_from_memory() {
        let (_tmp, orch) = setup(Arc::new(ScriptedExplainer::replying("unused")));
        let first = orch.diagnose("NameError: name 'x' is not defined").await.unwrap();
        let second = orch.diagnose("  NameError: name 'x' is not defined \n").await.unwrap();

        assert_eq!(second.source, SuggestionSource::Memory);
        assert_eq!(second.key, first.key);
        assert_eq!(second.suggestion, first.suggestion);
        assert!(second.similarity.unwrap() > 0.999);
        assert!(second.message().starts_with("Retrieved from memory (Info):"));
        assert_eq!(orch.store().count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_model_output_with_fix_is_kept() {
        let explainer = Arc::new(ScriptedExplainer::replying(
            "  Cause: Index out of range.\nFix: Check list length first.  ",
        ));
        let (_tmp, orch) = setup(explainer.clone());

        let d = orch.diagnose("IndexError: list index out of range").await.unwrap();
        assert_eq!(d.source, SuggestionSource::Model);
        assert_eq!(d.suggestion, "Cause: Index out of range.\nFix: Check list length first.");
        assert_eq!(d.severity, Severity::Info);
        assert_eq!(explainer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_model_output_without_fix_uses_fallback() {
        let (_tmp, orch) = setup(Arc::new(ScriptedExplainer::replying("it broke")));
        let d = orch.diagnose("KeyError: 'id'").await.unwrap();
        assert_eq!(d.source, SuggestionSource::Fallback);
        assert_eq!(
            d.suggestion,
            "Cause: Likely reason for 'KeyError: 'id''.\nFix: Please verify configuration, syntax, or logic."
        );
        // The fallback is stored like any other suggestion.
        let stored = orch.store().get(&d.key).unwrap().unwrap();
        assert_eq!(stored.suggestion, d.suggestion);
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let explainer = Arc::new(ScriptedExplainer::replying("unused"));
        let (_tmp, orch) = setup(explainer.clone());
        let err = orch.diagnose("   \n\t").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(orch.store().count().unwrap(), 0);
        assert_eq!(explainer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_explainer_failure_propagates_without_write() {
        let (_tmp, orch) = setup(Arc::new(ScriptedExplainer::failing("model down")));
        let err = orch.diagnose("KeyError: 'id'").await.unwrap_err();
        assert!(matches!(err, Error::Explain(_)));
        assert_eq!(orch.store().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unrelated_errors_stored_separately() {
        let (_tmp, orch) = setup(Arc::new(ScriptedExplainer::replying("unused")));
        let a = orch.diagnose("NameError: name 'x' is not defined").await.unwrap();
        let b = orch.diagnose("ConnectionError: Failed to connect to database").await.unwrap();
        assert_eq!(a.source, SuggestionSource::Template);
        assert_eq!(b.source, SuggestionSource::Template);
        assert_ne!(a.key, b.key);
        assert_eq!(b.severity, Severity::Critical);
        assert_eq!(orch.store().count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_store_once() {
        let explainer = Arc::new(
            ScriptedExplainer::replying("Cause: c.\nFix: f.").slow(Duration::from_millis(20)),
        );
        let (_tmp, orch) = setup(explainer.clone());

        // Both calls miss memory before either finishes explaining.
        let (a, b) = tokio::join!(
            orch.diagnose("TimeoutError: read timed out"),
            orch.diagnose("TimeoutError: read timed out"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(explainer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(orch.store().count().unwrap(), 1);
        assert_eq!(a.key, b.key);
        let mut sources = [a.source, b.source];
        sources.sort_by_key(|s| s.to_string());
        assert_eq!(sources, [SuggestionSource::Memory, SuggestionSource::Model]);
    }
}
