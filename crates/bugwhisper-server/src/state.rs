//! Shared application state.

use std::sync::Arc;

use bugwhisper_core::BugWhisperConfig;
use bugwhisper_explain::{Explainer, LLMConfig, LlmExplainer};
use bugwhisper_runtime::Orchestrator;
use bugwhisper_store::SqliteStore;
use parking_lot::RwLock;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: BugWhisperConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub llm_config: Arc<RwLock<LLMConfig>>,
}

impl AppState {
    /// Open the store, pick an embedder and load the LLM config from the
    /// data directory.
    pub fn open(config: BugWhisperConfig) -> bugwhisper_core::Result<Self> {
        let llm_config = LLMConfig::load(&config.data_paths.llm_config_file);
        Self::open_with_llm(config, llm_config)
    }

    pub fn open_with_llm(
        config: BugWhisperConfig,
        llm_config: LLMConfig,
    ) -> bugwhisper_core::Result<Self> {
        let store = Arc::new(SqliteStore::open(&config.data_paths.memory, config.embedding_dim)?);
        let embedder =
            bugwhisper_infer::create_embedder(&config.data_paths.models, config.embedding_dim);

        let llm_config = Arc::new(RwLock::new(llm_config));
        let explainer: Arc<dyn Explainer> = Arc::new(LlmExplainer::new(llm_config.clone())?);

        let orchestrator = Arc::new(Orchestrator::from_config(&config, store, embedder, explainer));

        Ok(Self {
            config,
            orchestrator,
            llm_config,
        })
    }

    pub fn store(&self) -> &SqliteStore {
        self.orchestrator.store()
    }
}
