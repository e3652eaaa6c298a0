use crate::mode::{CountUnit, ProcessingMode};
use serde::Deserialize;

/// Main configuration structure for Ripple-Ingest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub job: JobConfig,
    pub crawler: CrawlerConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    #[serde(default)]
    pub mode: ModeConfig,
    #[serde(default)]
    pub categories: CategoriesConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// What to crawl and how many workers ingest it
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// URL the crawl starts from; also the checkpoint identity
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Maximum number of pages the crawler may return
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Maximum link depth from the start URL
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Number of concurrent ingestion workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Fixed category for every page; disables automatic categorization
    #[serde(default)]
    pub category: Option<String>,
}

/// Crawl service endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Base URL of the crawl service
    pub endpoint: String,

    /// Request timeout for a whole crawl (seconds)
    #[serde(rename = "timeout-secs", default = "default_crawl_timeout")]
    pub timeout_secs: u64,
}

/// Remote knowledge store
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the document API (e.g. `https://host/v1`)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(rename = "api-key")]
    pub api_key: String,

    /// Page size for paginated listings
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Load every container and its documents before the job starts
    #[serde(rename = "preload-cache", default)]
    pub preload_cache: bool,

    /// Request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// OpenAI-compatible chat endpoint used for analysis and categorization
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,

    #[serde(rename = "api-key", default)]
    pub api_key: Option<String>,

    pub model: String,

    #[serde(rename = "timeout-secs", default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// Retry and circuit breaker tuning
#[derive(Debug, Clone, Deserialize)]
pub struct ResilienceConfig {
    /// Attempts per remote call, including the first
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(rename = "initial-delay-ms", default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(rename = "exponential-base", default = "default_exponential_base")]
    pub exponential_base: f64,

    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Consecutive failures that open a breaker
    #[serde(rename = "failure-threshold", default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Time an open breaker waits before allowing a trial call (seconds)
    #[serde(rename = "recovery-timeout-secs", default = "default_recovery_timeout")]
    pub recovery_timeout_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            exponential_base: default_exponential_base(),
            max_delay_ms: default_max_delay_ms(),
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout(),
        }
    }
}

/// Processing mode selection
#[derive(Debug, Clone, Deserialize)]
pub struct ModeConfig {
    /// Forces one mode for every page
    #[serde(default)]
    pub manual: Option<ProcessingMode>,

    /// Ask the LLM to analyze each page before falling back to heuristics
    #[serde(default)]
    pub intelligent: bool,

    /// Pages longer than this many units are split into paragraphs
    #[serde(default = "default_mode_threshold")]
    pub threshold: usize,

    #[serde(rename = "count-unit", default)]
    pub count_unit: CountUnit,

    /// URL path patterns that always get full-document mode
    #[serde(rename = "full-doc-patterns", default = "default_full_doc_patterns")]
    pub full_doc_patterns: Vec<String>,

    /// Characters of page content sent to the LLM for analysis
    #[serde(rename = "sample-chars", default = "default_sample_chars")]
    pub sample_chars: usize,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            manual: None,
            intelligent: false,
            threshold: default_mode_threshold(),
            count_unit: CountUnit::default(),
            full_doc_patterns: default_full_doc_patterns(),
            sample_chars: default_sample_chars(),
        }
    }
}

/// Category normalization and matching
#[derive(Debug, Clone, Deserialize)]
pub struct CategoriesConfig {
    #[serde(rename = "similarity-threshold", default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[serde(rename = "keyword-threshold", default = "default_keyword_threshold")]
    pub keyword_threshold: f64,

    /// Maximum length of a normalized category name
    #[serde(rename = "max-length", default = "default_category_max_length")]
    pub max_length: usize,
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            keyword_threshold: default_keyword_threshold(),
            max_length: default_category_max_length(),
        }
    }
}

/// Where job state and reports are written
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(rename = "checkpoint-dir", default = "default_checkpoint_dir")]
    pub checkpoint_dir: String,

    /// Save the checkpoint after this many processed URLs
    #[serde(rename = "save-interval", default = "default_save_interval")]
    pub save_interval: usize,

    #[serde(rename = "failure-queue-path", default = "default_failure_queue_path")]
    pub failure_queue_path: String,

    #[serde(rename = "failure-report-path", default = "default_failure_report_path")]
    pub failure_report_path: String,

    /// Retries allowed per failed URL before it stops being re-driven
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Optional markdown summary written at job end
    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: default_checkpoint_dir(),
            save_interval: default_save_interval(),
            failure_queue_path: default_failure_queue_path(),
            failure_report_path: default_failure_report_path(),
            max_retries: default_max_retries(),
            summary_path: None,
        }
    }
}

fn default_max_pages() -> u32 {
    100
}

fn default_max_depth() -> u32 {
    3
}

fn default_workers() -> usize {
    3
}

fn default_crawl_timeout() -> u64 {
    600
}

fn default_request_timeout() -> u64 {
    60
}

fn default_page_size() -> u32 {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    2_000
}

fn default_exponential_base() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> u64 {
    60
}

fn default_mode_threshold() -> usize {
    4_000
}

fn default_full_doc_patterns() -> Vec<String> {
    ["/api/", "/faq", "/changelog", "/reference/"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_sample_chars() -> usize {
    3_000
}

fn default_similarity_threshold() -> f64 {
    0.85
}

fn default_keyword_threshold() -> f64 {
    0.5
}

fn default_category_max_length() -> usize {
    50
}

fn default_checkpoint_dir() -> String {
    "./checkpoints".to_string()
}

fn default_save_interval() -> usize {
    10
}

fn default_failure_queue_path() -> String {
    "./failed_urls.json".to_string()
}

fn default_failure_report_path() -> String {
    "./failure_report.json".to_string()
}

fn default_max_retries() -> u32 {
    3
}
