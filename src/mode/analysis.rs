use crate::llm::LlmClient;
use crate::resilience::{EndpointClass, RemoteError, ResilientClient};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Why content analysis produced no usable answer
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] RemoteError),

    #[error("no JSON object in LLM output")]
    NoJson,

    #[error("invalid analysis JSON: {0}")]
    InvalidJson(String),

    #[error("unknown recommended mode '{0}'")]
    UnknownMode(String),
}

/// Parsed LLM judgement of a page
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContentAnalysis {
    /// Page has no value for the knowledge base
    #[serde(default, alias = "should_skip", alias = "shouldSkip")]
    pub skip: bool,

    /// Value classification, e.g. `high`, `medium`, `low`
    #[serde(default, alias = "value_classification", alias = "content_value")]
    pub value: Option<String>,

    /// Structure classification, e.g. `reference`, `tutorial`, `narrative`
    #[serde(default, alias = "structure_classification", alias = "content_structure")]
    pub structure: Option<String>,

    #[serde(
        default,
        alias = "recommendedMode",
        alias = "mode",
        alias = "processing_mode"
    )]
    pub recommended_mode: Option<String>,

    #[serde(default, alias = "reasoning", alias = "justification")]
    pub reason: Option<String>,
}

/// Judges a page's value and structure
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze(&self, url: &str, content: &str) -> Result<ContentAnalysis, AnalysisError>;
}

/// [`ContentAnalyzer`] backed by an LLM, called through the "analysis" breaker
pub struct LlmContentAnalyzer {
    llm: Arc<dyn LlmClient>,
    client: Arc<ResilientClient>,
    sample_chars: usize,
}

impl LlmContentAnalyzer {
    pub fn new(llm: Arc<dyn LlmClient>, client: Arc<ResilientClient>, sample_chars: usize) -> Self {
        Self {
            llm,
            client,
            sample_chars,
        }
    }

    fn build_prompt(&self, url: &str, content: &str) -> String {
        let sample: String = content.chars().take(self.sample_chars).collect();
        format!(
            "You decide how documentation pages are stored in a retrieval system.\n\
             Answer with a JSON object with these fields:\n\
             - \"skip\": true if the page has no lasting value (navigation, legal, empty)\n\
             - \"value\": \"high\", \"medium\" or \"low\"\n\
             - \"structure\": \"reference\", \"tutorial\", \"narrative\" or \"mixed\"\n\
             - \"recommended_mode\": \"full_doc\" for short or tightly connected pages, \
             \"paragraph\" for long pages with independent sections\n\
             - \"reason\": one sentence\n\n\
             URL: {}\n\
             Content sample:\n{}",
            url, sample
        )
    }
}

#[async_trait]
impl ContentAnalyzer for LlmContentAnalyzer {
    async fn analyze(&self, url: &str, content: &str) -> Result<ContentAnalysis, AnalysisError> {
        let prompt = self.build_prompt(url, content);
        let reply = self
            .client
            .execute(EndpointClass::Analysis, || self.llm.complete(&prompt))
            .await?;
        parse_analysis(&reply)
    }
}

/// Parses free-form LLM output into a [`ContentAnalysis`]
pub fn parse_analysis(reply: &str) -> Result<ContentAnalysis, AnalysisError> {
    let json = extract_json_object(reply).ok_or(AnalysisError::NoJson)?;
    serde_json::from_str(json).map_err(|e| AnalysisError::InvalidJson(e.to_string()))
}

/// Finds the first balanced `{...}` block in `text` that is a JSON object
///
/// Tolerates surrounding prose and code fences. Braces inside JSON strings
/// are ignored while balancing.
///
/// # Examples
///
/// ```
/// use ripple_ingest::mode::extract_json_object;
///
/// let text = "Sure! ```json\n{\"skip\": false, \"note\": \"a } brace\"}\n```";
/// assert_eq!(
///     extract_json_object(text),
///     Some("{\"skip\": false, \"note\": \"a } brace\"}")
/// );
/// ```
pub fn extract_json_object(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(&text[start..]) {
            let candidate = &text[start..start + end];
            if serde_json::from_str::<serde_json::Value>(candidate)
                .map(|v| v.is_object())
                .unwrap_or(false)
            {
                return Some(candidate);
            }
        }
        search_from = start + 1;
    }
    None
}

/// Byte length of the balanced block starting at `s[0] == '{'`
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResilienceConfig;
    use crate::events::RecordingSink;
    use crate::llm::MockLlm;

    #[test]
    fn test_extract_plain() {
        assert_eq!(extract_json_object("{\"a\":1}"), Some("{\"a\":1}"));
    }

    #[test]
    fn test_extract_from_prose_and_fence() {
        let text = "Here is my analysis:\n```json\n{\"skip\": true, \"nested\": {\"x\": 1}}\n```\nHope it helps {";
        assert_eq!(
            extract_json_object(text),
            Some("{\"skip\": true, \"nested\": {\"x\": 1}}")
        );
    }

    #[test]
    fn test_extract_skips_non_json_braces() {
        let text = "Use {placeholder} syntax. {\"value\": \"high\"}";
        assert_eq!(extract_json_object(text), Some("{\"value\": \"high\"}"));
    }

    #[test]
    fn test_extract_escaped_quotes() {
        let text = r#"{"reason": "says \"}\" often"}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_extract_none() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("{\"unterminated\": 1"), None);
    }

    #[test]
    fn test_parse_aliases() {
        let analysis = parse_analysis(
            r#"{"should_skip": false, "value_classification": "high",
                "structure_classification": "reference", "recommendedMode": "paragraph"}"#,
        )
        .unwrap();
        assert!(!analysis.skip);
        assert_eq!(analysis.value.as_deref(), Some("high"));
        assert_eq!(analysis.structure.as_deref(), Some("reference"));
        assert_eq!(analysis.recommended_mode.as_deref(), Some("paragraph"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_analysis("nothing"), Err(AnalysisError::NoJson)));
        assert!(matches!(
            parse_analysis(r#"{"skip": "maybe"}"#),
            Err(AnalysisError::InvalidJson(_))
        ));
    }

    #[tokio::test]
    async fn test_llm_analyzer_sends_sample() {
        let llm = Arc::new(MockLlm::new(
            "```json\n{\"skip\": false, \"recommended_mode\": \"full_doc\"}\n```",
        ));
        let client = Arc::new(ResilientClient::new(
            &ResilienceConfig::default(),
            Arc::new(RecordingSink::new()),
        ));
        let analyzer = LlmContentAnalyzer::new(llm.clone(), client, 10);

        let result = analyzer
            .analyze("https://x.com/a", "a very long page body")
            .await
            .unwrap();
        assert_eq!(result.recommended_mode.as_deref(), Some("full_doc"));
        assert_eq!(llm.calls(), 1);

        let prompt = analyzer.build_prompt("https://x.com/a", "a very long page body");
        assert!(prompt.contains("a very lon"));
        assert!(!prompt.contains("a very long"));
    }
}
