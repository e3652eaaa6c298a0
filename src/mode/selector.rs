use super::{count_units, AnalysisError, ContentAnalysis, ContentAnalyzer, CountUnit, ProcessingMode};
use crate::config::ModeConfig;
use crate::url::matches_path_pattern;
use std::sync::Arc;
use url::Url;

/// Step of the precedence chain that produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionBranch {
    Manual,
    Intelligent,
    UrlPattern,
    Threshold,
}

impl DecisionBranch {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionBranch::Manual => "manual",
            DecisionBranch::Intelligent => "intelligent",
            DecisionBranch::UrlPattern => "url_pattern",
            DecisionBranch::Threshold => "threshold",
        }
    }
}

/// A mode, or the sentinel that says the page should not be ingested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeOutcome {
    Mode(ProcessingMode),
    Skip,
}

/// Result of [`ModeSelector::select`]
#[derive(Debug, Clone, PartialEq)]
pub struct ModeDecision {
    pub outcome: ModeOutcome,
    pub branch: DecisionBranch,
    /// Human-readable justification
    pub reason: String,
}

impl ModeDecision {
    fn new(outcome: ModeOutcome, branch: DecisionBranch, reason: impl Into<String>) -> Self {
        Self {
            outcome,
            branch,
            reason: reason.into(),
        }
    }

    pub fn mode(&self) -> Option<ProcessingMode> {
        match self.outcome {
            ModeOutcome::Mode(mode) => Some(mode),
            ModeOutcome::Skip => None,
        }
    }

    pub fn is_skip(&self) -> bool {
        self.outcome == ModeOutcome::Skip
    }

    pub fn outcome_label(&self) -> &'static str {
        match self.outcome {
            ModeOutcome::Mode(mode) => mode.as_str(),
            ModeOutcome::Skip => "skip",
        }
    }
}

/// Chooses a processing mode per page
///
/// # Precedence
///
/// 1. Manual override: the configured mode, always
/// 2. Intelligent: LLM analysis; `skip` yields [`ModeOutcome::Skip`]. Any
///    failure falls through and never causes a skip
/// 3. URL pattern: path matches a full-doc pattern → `FullDoc`
/// 4. Threshold: `count > threshold` → `Paragraph`, else `FullDoc`
pub struct ModeSelector {
    manual: Option<ProcessingMode>,
    analyzer: Option<Arc<dyn ContentAnalyzer>>,
    full_doc_patterns: Vec<String>,
    threshold: usize,
    unit: CountUnit,
}

impl ModeSelector {
    pub fn new(
        manual: Option<ProcessingMode>,
        analyzer: Option<Arc<dyn ContentAnalyzer>>,
        full_doc_patterns: Vec<String>,
        threshold: usize,
        unit: CountUnit,
    ) -> Self {
        Self {
            manual,
            analyzer,
            full_doc_patterns,
            threshold,
            unit,
        }
    }

    /// Builds a selector; `analyzer` is only used when `intelligent` is on
    pub fn from_config(config: &ModeConfig, analyzer: Option<Arc<dyn ContentAnalyzer>>) -> Self {
        Self::new(
            config.manual,
            analyzer.filter(|_| config.intelligent),
            config.full_doc_patterns.clone(),
            config.threshold,
            config.count_unit,
        )
    }

    pub async fn select(&self, url: &str, content: &str) -> ModeDecision {
        if let Some(mode) = self.manual {
            return ModeDecision::new(
                ModeOutcome::Mode(mode),
                DecisionBranch::Manual,
                format!("manual override to {}", mode),
            );
        }

        if let Some(analyzer) = &self.analyzer {
            match analyzer.analyze(url, content).await.and_then(interpret) {
                Ok(decision) => return decision,
                Err(e) => {
                    tracing::debug!("Content analysis for {} unusable, falling back: {}", url, e)
                }
            }
        }

        let path = Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string());
        if let Some(pattern) = self
            .full_doc_patterns
            .iter()
            .find(|p| matches_path_pattern(p, &path))
        {
            return ModeDecision::new(
                ModeOutcome::Mode(ProcessingMode::FullDoc),
                DecisionBranch::UrlPattern,
                format!("path matches '{}'", pattern),
            );
        }

        let count = count_units(content, self.unit);
        let unit = match self.unit {
            CountUnit::Words => "words",
            CountUnit::Tokens => "tokens",
        };
        let mode = if count > self.threshold {
            ProcessingMode::Paragraph
        } else {
            ProcessingMode::FullDoc
        };
        ModeDecision::new(
            ModeOutcome::Mode(mode),
            DecisionBranch::Threshold,
            format!("{} {} vs threshold {}", count, unit, self.threshold),
        )
    }
}

/// Turns an analysis into a decision; a missing or unknown mode is an error
fn interpret(analysis: ContentAnalysis) -> Result<ModeDecision, AnalysisError> {
    let classes = format!(
        "value={}, structure={}",
        analysis.value.as_deref().unwrap_or("?"),
        analysis.structure.as_deref().unwrap_or("?")
    );

    if analysis.skip {
        let reason = analysis.reason.unwrap_or_else(|| "judged low value".to_string());
        return Ok(ModeDecision::new(
            ModeOutcome::Skip,
            DecisionBranch::Intelligent,
            format!("{} ({})", reason, classes),
        ));
    }

    let raw = analysis.recommended_mode.unwrap_or_default();
    let mode = ProcessingMode::parse(&raw).ok_or(AnalysisError::UnknownMode(raw))?;
    Ok(ModeDecision::new(
        ModeOutcome::Mode(mode),
        DecisionBranch::Intelligent,
        match analysis.reason {
            Some(reason) => format!("{} ({})", reason, classes),
            None => classes,
        },
    ))
}
