//! The explainer boundary used by the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bugwhisper_core::{Error, Result};
use parking_lot::RwLock;
use reqwest::Client;
use tracing::warn;

use crate::config::LLMConfig;
use crate::providers;
use crate::types::CompletionOptions;

/// Turns a prompt into free text. The output format is not guaranteed.
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, prompt: &str) -> Result<String>;

    /// Whether a call would reach a real model.
    fn is_available(&self) -> bool;

    fn name(&self) -> &str;
}

/// Explainer backed by whichever LLM provider the shared config resolves to.
///
/// The config is read on every call. With no provider configured the result
/// is an empty string.
pub struct LlmExplainer {
    config: Arc<RwLock<LLMConfig>>,
    client: Client,
    options: CompletionOptions,
}

impl LlmExplainer {
    pub fn new(config: Arc<RwLock<LLMConfig>>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            config,
            client,
            options: CompletionOptions::default(),
        })
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &Arc<RwLock<LLMConfig>> {
        &self.config
    }
}

#[async_trait]
impl Explainer for LlmExplainer {
    async fn explain(&self, prompt: &str) -> Result<String> {
        let target = self.config.read().resolve_provider();
        match target {
            Some(target) => providers::complete(&self.client, &target, prompt, self.options).await,
            None => {
                warn!("No LLM provider configured, skipping generation");
                Ok(String::new())
            }
        }
    }

    fn is_available(&self) -> bool {
        self.config.read().resolve_provider().is_some()
    }

    fn name(&self) -> &str {
        "llm"
    }
}
