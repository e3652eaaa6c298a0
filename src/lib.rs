//! Ripple-Ingest: crash-recoverable crawl ingestion into a knowledge store
//!
//! This crate takes pages produced by a crawl service and pushes them into a
//! categorized remote knowledge store, surviving network failures, partial
//! crawls and process restarts. Pages are deduplicated by a canonical name
//! derived from their URL, grouped into containers by a fuzzy category matcher,
//! and chunked according to a per-page processing mode.

pub mod categorize;
pub mod config;
pub mod crawler;
pub mod events;
pub mod http;
pub mod ingest;
pub mod llm;
pub mod mode;
pub mod output;
pub mod resilience;
pub mod state;
pub mod store;
pub mod url;

use thiserror::Error;

/// Main error type for Ripple-Ingest operations
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("State error: {0}")]
    State(#[from] state::StateError),

    #[error("Remote call failed: {0}")]
    Remote(#[from] resilience::RemoteError),

    #[error("Crawl error: {0}")]
    Crawl(#[from] crawler::CrawlError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid URL pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Ripple-Ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use ingest::{Collaborators, Orchestrator, RunSummary};
pub use mode::ProcessingMode;
pub use state::{Checkpoint, FailureQueue, UrlStatus};
pub use url::{canonical_name, normalize_url, DocumentName};
