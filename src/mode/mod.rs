//! Per-page processing mode selection
//!
//! [`ModeSelector::select`] walks a fixed precedence chain (manual override,
//! LLM content analysis, URL pattern heuristic, length threshold) and returns
//! the chosen [`ProcessingMode`] with the branch that decided it.

mod analysis;
mod counting;
mod selector;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use analysis::{extract_json_object, AnalysisError, ContentAnalysis, ContentAnalyzer, LlmContentAnalyzer};
pub use counting::count_units;
pub use selector::{DecisionBranch, ModeDecision, ModeOutcome, ModeSelector};

/// How a document's content is chunked in the knowledge store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// The whole page is one retrievable unit
    FullDoc,
    /// The page is split into paragraph chunks
    Paragraph,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::FullDoc => "full_doc",
            ProcessingMode::Paragraph => "paragraph",
        }
    }

    /// Lenient parse of a mode name as written by humans or models
    pub fn parse(s: &str) -> Option<Self> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        match key.as_str() {
            "fulldoc" | "fulldocument" | "full" | "document" => Some(ProcessingMode::FullDoc),
            "paragraph" | "paragraphs" | "chunk" | "chunked" => Some(ProcessingMode::Paragraph),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit used when measuring content length against the threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountUnit {
    #[default]
    Words,
    /// Estimated as `ceil(chars / 4)`
    Tokens,
}
