//! Generative explanations from external LLMs (OpenAI/Anthropic/Groq/Ollama).
//!
//! The model is a black box: a prompt goes in, free text comes out. Calls are
//! non-streaming and are not retried.

pub mod config;
pub mod explainer;
pub mod providers;
pub mod types;

pub use config::LLMConfig;
pub use explainer::{Explainer, LlmExplainer};
pub use types::*;
