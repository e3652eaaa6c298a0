//! Terminal status of a URL in a checkpoint

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome recorded for a processed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlStatus {
    /// Document was created in the knowledge store
    Success,

    /// Every attempt failed; may be re-driven from the failure queue
    Failed,

    /// Deliberately not ingested (already present, or judged low value)
    Skipped,
}

impl UrlStatus {
    /// Returns true if the URL ended in the knowledge store
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if a later run may overwrite this entry
    ///
    /// Only failures can be upgraded; success and skip are final.
    pub fn is_redrivable(&self) -> bool {
        matches!(self, Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
