//! LLM completion capability
//!
//! The crate never runs inference itself. [`LlmClient`] is the contract;
//! [`ChatCompletionClient`] talks to any OpenAI-compatible endpoint and
//! [`MockLlm`] returns canned answers for tests and dry runs.

mod openai;

use crate::resilience::RemoteError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub use openai::ChatCompletionClient;

/// Text-in, text-out completion
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, RemoteError>;
}

/// Deterministic LLM double
///
/// Answers with the response of the first rule whose key occurs in the
/// prompt, else the default response, else an error.
#[derive(Debug, Default)]
pub struct MockLlm {
    rules: Mutex<Vec<(String, String)>>,
    default_response: Option<String>,
    calls: AtomicUsize,
}

impl MockLlm {
    /// Always answers `response`
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: Some(response.into()),
            ..Self::default()
        }
    }

    /// Fails every call with a transient error
    pub fn failing() -> Self {
        Self::default()
    }

    /// Answers `response` when the prompt contains `key`
    pub fn with_rule(self, key: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((key.into(), response.into()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, prompt: &str) -> Result<String, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let rules = self
            .rules
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some((_, response)) = rules.iter().find(|(key, _)| prompt.contains(key.as_str())) {
            return Ok(response.clone());
        }

        self.default_response
            .clone()
            .ok_or_else(|| RemoteError::Transient("mock LLM unavailable".to_string()))
    }
}
