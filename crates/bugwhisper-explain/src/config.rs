//! LLM configuration persistence and provider selection.

use std::path::{Path, PathBuf};

use bugwhisper_core::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{LLMConfigResponse, LLMConfigUpdate, LLMProvider, ResolvedProvider};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-20241022";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3";

pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Stored LLM configuration (persisted to llm-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    /// Base URL of a local Ollama server, e.g. `http://localhost:11434`.
    #[serde(default)]
    pub ollama_url: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    /// Path to config file for saving.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}
fn default_ollama_model() -> String {
    DEFAULT_OLLAMA_MODEL.into()
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            preferred_provider: "auto".into(),
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            ollama_url: None,
            openai_model: DEFAULT_OPENAI_MODEL.into(),
            anthropic_model: DEFAULT_ANTHROPIC_MODEL.into(),
            groq_model: DEFAULT_GROQ_MODEL.into(),
            ollama_model: DEFAULT_OLLAMA_MODEL.into(),
            config_path: PathBuf::new(),
        }
    }
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Same as [`LLMConfig::load`] with an explicit variable lookup.
    pub fn load_with<F>(config_path: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: LLMConfig = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        config.config_path = config_path.to_path_buf();

        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if config.openai_api_key.is_none() {
            config.openai_api_key = lookup("OPENAI_API_KEY");
        }
        if config.anthropic_api_key.is_none() {
            config.anthropic_api_key = lookup("ANTHROPIC_API_KEY");
        }
        if config.groq_api_key.is_none() {
            config.groq_api_key = lookup("GROQ_API_KEY");
        }
        if config.ollama_url.is_none() {
            config.ollama_url = lookup("OLLAMA_URL");
        }

        config
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved LLM config to {}", self.config_path.display());
        Ok(())
    }

    /// Apply an update, merging with existing config.
    pub fn apply_update(&mut self, update: &LLMConfigUpdate) {
        if let Some(p) = &update.preferred_provider {
            self.preferred_provider = p.clone();
        }
        if let Some(k) = &update.openai_api_key {
            self.openai_api_key = Some(k.clone());
        }
        if let Some(k) = &update.anthropic_api_key {
            self.anthropic_api_key = Some(k.clone());
        }
        if let Some(k) = &update.groq_api_key {
            self.groq_api_key = Some(k.clone());
        }
        if let Some(u) = &update.ollama_url {
            self.ollama_url = Some(u.clone());
        }
        if let Some(m) = &update.openai_model {
            self.openai_model = m.clone();
        }
        if let Some(m) = &update.anthropic_model {
            self.anthropic_model = m.clone();
        }
        if let Some(m) = &update.groq_model {
            self.groq_model = m.clone();
        }
        if let Some(m) = &update.ollama_model {
            self.ollama_model = m.clone();
        }
    }

    fn openai(&self) -> Option<ResolvedProvider> {
        self.openai_api_key.as_ref().map(|k| ResolvedProvider {
            provider: LLMProvider::OpenAI,
            model: self.openai_model.clone(),
            api_key: Some(k.clone()),
            endpoint: OPENAI_ENDPOINT.into(),
        })
    }

    fn anthropic(&self) -> Option<ResolvedProvider> {
        self.anthropic_api_key.as_ref().map(|k| ResolvedProvider {
            provider: LLMProvider::Anthropic,
            model: self.anthropic_model.clone(),
            api_key: Some(k.clone()),
            endpoint: ANTHROPIC_ENDPOINT.into(),
        })
    }

    fn groq(&self) -> Option<ResolvedProvider> {
        self.groq_api_key.as_ref().map(|k| ResolvedProvider {
            provider: LLMProvider::Groq,
            model: self.groq_model.clone(),
            api_key: Some(k.clone()),
            endpoint: GROQ_ENDPOINT.into(),
        })
    }

    fn ollama(&self) -> Option<ResolvedProvider> {
        self.ollama_url.as_ref().map(|base| ResolvedProvider {
            provider: LLMProvider::Ollama,
            model: self.ollama_model.clone(),
            api_key: None,
            endpoint: format!("{}/api/generate", base.trim_end_matches('/')),
        })
    }

    /// Resolve which provider and model to use.
    pub fn resolve_provider(&self) -> Option<ResolvedProvider> {
        // Explicit preference
        if self.preferred_provider != "auto" {
            return match self.preferred_provider.as_str() {
                "openai" => self.openai(),
                "anthropic" => self.anthropic(),
                "groq" => self.groq(),
                "ollama" => self.ollama(),
                _ => None,
            };
        }

        // Auto mode: Anthropic > Groq > OpenAI > Ollama
        self.anthropic()
            .or_else(|| self.groq())
            .or_else(|| self.openai())
            .or_else(|| self.ollama())
    }

    /// Build the public config response (no API keys exposed).
    pub fn to_response(&self) -> LLMConfigResponse {
        let resolved = self.resolve_provider();
        LLMConfigResponse {
            preferred_provider: self.preferred_provider.clone(),
            openai_configured: self.openai_api_key.is_some(),
            anthropic_configured: self.anthropic_api_key.is_some(),
            groq_configured: self.groq_api_key.is_some(),
            ollama_configured: self.ollama_url.is_some(),
            openai_model: self.openai_model.clone(),
            anthropic_model: self.anthropic_model.clone(),
            groq_model: self.groq_model.clone(),
            ollama_model: self.ollama_model.clone(),
            active_provider: resolved.map(|r| r.provider.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = LLMConfig::load_with(&tmp.path().join("llm-config.json"), no_env);
        assert_eq!(config.preferred_provider, "auto");
        assert_eq!(config.ollama_model, DEFAULT_OLLAMA_MODEL);
        assert!(config.resolve_provider().is_none());
    }

    #[test]
    fn test_env_fallback_for_keys() {
        let tmp = TempDir::new().unwrap();
        let config = LLMConfig::load_with(&tmp.path().join("llm-config.json"), |k| match k {
            "GROQ_API_KEY" => Some("gsk-test".into()),
            "OPENAI_API_KEY" => Some("   ".into()),
            _ => None,
        });
        assert_eq!(config.groq_api_key.as_deref(), Some("gsk-test"));
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn test_auto_order() {
        let mut config = LLMConfig {
            ollama_url: Some("http://localhost:11434/".into()),
            ..Default::default()
        };
        let r = config.resolve_provider().unwrap();
        assert_eq!(r.provider, LLMProvider::Ollama);
        assert_eq!(r.endpoint, "http://localhost:11434/api/generate");
        assert!(r.api_key.is_none());

        config.openai_api_key = Some("sk".into());
        assert_eq!(config.resolve_provider().unwrap().provider, LLMProvider::OpenAI);
        config.groq_api_key = Some("gsk".into());
        assert_eq!(config.resolve_provider().unwrap().provider, LLMProvider::Groq);
        config.anthropic_api_key = Some("ant".into());
        let r = config.resolve_provider().unwrap();
        assert_eq!(r.provider, LLMProvider::Anthropic);
        assert_eq!(r.endpoint, ANTHROPIC_ENDPOINT);
    }

    #[test]
    fn test_explicit_preference_without_key_resolves_nothing() {
        let config = LLMConfig {
            preferred_provider: "openai".into(),
            groq_api_key: Some("gsk".into()),
            ..Default::default()
        };
        assert!(config.resolve_provider().is_none());
    }

    #[test]
    fn test_save_load_and_masked_response() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("llm-config.json");
        let mut config = LLMConfig::load_with(&path, no_env);
        config.apply_update(&LLMConfigUpdate {
            preferred_provider: Some("anthropic".into()),
            anthropic_api_key: Some("secret-key".into()),
            anthropic_model: Some("claude-3-5-sonnet-20241022".into()),
            ..Default::default()
        });
        config.save().unwrap();

        let reloaded = LLMConfig::load_with(&path, no_env);
        assert_eq!(reloaded.preferred_provider, "anthropic");
        assert_eq!(reloaded.anthropic_model, "claude-3-5-sonnet-20241022");

        let response = reloaded.to_response();
        assert!(response.anthropic_configured);
        assert_eq!(response.active_provider.as_deref(), Some("anthropic"));
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("secret-key"));
    }
}
