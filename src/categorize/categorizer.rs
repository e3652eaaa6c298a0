use super::{CategoryMatch, CategoryMatcher};
use crate::llm::LlmClient;
use crate::resilience::{EndpointClass, ResilientClient};
use crate::url::{domain_label, extract_domain, normalize_url};
use std::sync::Arc;

/// Characters of page content included in the categorization prompt
const PROMPT_SAMPLE_CHARS: usize = 1_500;

/// Where a category label came from before matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySource {
    Fixed,
    Llm,
    Domain,
}

/// Picks the destination container name for a page
pub struct Categorizer {
    matcher: CategoryMatcher,
    fixed: Option<String>,
    llm: Option<Arc<dyn LlmClient>>,
    client: Arc<ResilientClient>,
}

impl Categorizer {
    pub fn new(
        matcher: CategoryMatcher,
        fixed: Option<String>,
        llm: Option<Arc<dyn LlmClient>>,
        client: Arc<ResilientClient>,
    ) -> Self {
        Self {
            matcher,
            fixed,
            llm,
            client,
        }
    }

    pub fn matcher(&self) -> &CategoryMatcher {
        &self.matcher
    }

    /// Chooses a raw label for the page, then resolves it against `known`
    ///
    /// A fixed category wins. Otherwise the LLM is asked for a label; if it is
    /// absent or fails, the site's domain name is used.
    pub async fn categorize(
        &self,
        url: &str,
        content: &str,
        known: &[String],
    ) -> (CategoryMatch, CategorySource) {
        let (label, source) = match &self.fixed {
            Some(fixed) => (fixed.clone(), CategorySource::Fixed),
            None => match self.ask_llm(url, content, known).await {
                Some(label) => (label, CategorySource::Llm),
                None => (domain_fallback(url), CategorySource::Domain),
            },
        };

        let resolved = self.matcher.resolve(&label, known);
        tracing::debug!(
            "Category for {}: '{}' -> '{}' ({:?}, from {:?})",
            url,
            label,
            resolved.name,
            resolved.kind,
            source
        );
        (resolved, source)
    }

    async fn ask_llm(&self, url: &str, content: &str, known: &[String]) -> Option<String> {
        let llm = self.llm.as_ref()?;
        let prompt = build_prompt(url, content, known);

        match self
            .client
            .execute(EndpointClass::Analysis, || llm.complete(&prompt))
            .await
        {
            Ok(reply) => parse_label(&reply),
            Err(e) => {
                tracing::debug!("LLM categorization failed for {}: {}", url, e);
                None
            }
        }
    }
}

fn build_prompt(url: &str, content: &str, known: &[String]) -> String {
    let sample: String = content.chars().take(PROMPT_SAMPLE_CHARS).collect();
    let existing = if known.is_empty() {
        "(none yet)".to_string()
    } else {
        known.join(", ")
    };

    format!(
        "Classify this documentation page into a short topic category (1-3 words), \
         such as the product, framework or technology it documents.\n\
         Reuse one of the existing categories if it fits.\n\
         Existing categories: {}\n\
         URL: {}\n\
         Content:\n{}\n\n\
         Reply with the category name only.",
        existing, url, sample
    )
}

/// First non-empty line of the reply with quotes and labels stripped
fn parse_label(reply: &str) -> Option<String> {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .strip_prefix("Category:")
        .or_else(|| line.strip_prefix("category:"))
        .unwrap_or(line);
    let label = line
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '*' || c == '.')
        .trim();

    if label.is_empty() || label.chars().count() > 80 {
        None
    } else {
        Some(label.to_string())
    }
}

fn domain_fallback(url: &str) -> String {
    normalize_url(url)
        .ok()
        .and_then(|u| extract_domain(&u))
        .map(|d| domain_label(&d))
        .unwrap_or_default()
}
