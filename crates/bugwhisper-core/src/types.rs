//! Shared domain types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Coarse triage label assigned to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::Warning => "Warning",
            Self::Info => "Info",
        }
    }

    /// Display color used by the dashboard.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Critical => "red",
            Self::Warning => "orange",
            Self::Info => "green",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Critical" => Ok(Self::Critical),
            "Warning" => Ok(Self::Warning),
            "Info" => Ok(Self::Info),
            other => Err(Error::InvalidInput(format!("unknown severity: {}", other))),
        }
    }
}
