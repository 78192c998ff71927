//! Runtime types.

use bugwhisper_core::Severity;
use serde::Serialize;

/// Where a suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    /// A stored record matched the error.
    Memory,
    /// A built-in template for a known error category.
    Template,
    /// The generative explainer, with a usable "Fix:" section.
    Model,
    /// Canned text used when the explainer's output had no "Fix:".
    Fallback,
}

impl std::fmt::Display for SuggestionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Template => write!(f, "template"),
            Self::Model => write!(f, "model"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Outcome of diagnosing one error line.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub severity: Severity,
    pub suggestion: String,
    pub source: SuggestionSource,
    /// Key of the stored record (matched or newly appended).
    pub key: String,
    /// Cosine similarity when the suggestion came from memory.
    pub similarity: Option<f32>,
}

impl Diagnosis {
    pub fn from_memory(&self) -> bool {
        self.source == SuggestionSource::Memory
    }

    /// Human-readable form shown by the dashboard and the CLI.
    pub fn message(&self) -> String {
        if self.from_memory() {
            format!("Retrieved from memory ({}):\n\n{}", self.severity, self.suggestion)
        } else {
            format!("Suggestion ({}):\n\n{}", self.severity, self.suggestion)
        }
    }
}
