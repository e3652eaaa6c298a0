//! Integration tests for the ingestion pipeline
//!
//! The job-level tests drive an [`Orchestrator`] against in-process doubles;
//! the service tests put the HTTP adapters in front of wiremock servers.
//!
//! [`Orchestrator`]: ripple_ingest::Orchestrator

mod ingest_tests;
mod service_tests;

use ripple_ingest::config::{parse_config, Config};
use ripple_ingest::crawler::CrawledPage;
use std::path::Path;

/// Builds a job configuration rooted in `dir`, with fast retries
///
/// `extra` is appended verbatim and may add whole tables.
pub fn create_test_config(dir: &Path, store_url: &str, crawler_url: &str, extra: &str) -> Config {
    let toml = format!(
        r#"
        [job]
        start-url = "https://docs.example.com/"
        workers = 1

        [crawler]
        endpoint = "{crawler_url}"
        timeout-secs = 5

        [store]
        base-url = "{store_url}"
        api-key = "test-key"
        page-size = 2
        timeout-secs = 5

        [resilience]
        max-attempts = 2
        initial-delay-ms = 1
        max-delay-ms = 2

        [output]
        checkpoint-dir = "{dir}/checkpoints"
        save-interval = 1
        failure-queue-path = "{dir}/failed.json"
        failure-report-path = "{dir}/failure_report.json"
        {extra}
        "#,
        crawler_url = crawler_url,
        store_url = store_url,
        dir = dir.display(),
        extra = extra,
    );
    parse_config(&toml).expect("test config is valid")
}

/// A successful page under the test start URL
pub fn page(path: &str) -> CrawledPage {
    CrawledPage::ok(
        format!("https://docs.example.com{}", path),
        format!("# Page {}\n\nSome documentation about {}.", path, path),
    )
}
