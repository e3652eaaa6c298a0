//! End-to-end runs through the HTTP adapters against wiremock servers

use crate::{create_test_config, page};
use ripple_ingest::ingest::Collaborators;
use ripple_ingest::{Orchestrator, UrlStatus};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Crawl service answering with the given pages
async fn mock_crawler(results: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/crawl"))
        .and(body_partial_json(json!({"urls": ["https://docs.example.com/"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": results })))
        .mount(&server)
        .await;
    server
}

/// Knowledge store with no containers yet
///
/// The first document creation answers 503 so the retry path is exercised;
/// wiremock prefers the earlier-mounted mock while it still has uses left.
async fn mock_store() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/datasets"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [], "has_more": false})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/datasets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c1", "name": "docs"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/datasets/c1/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [], "has_more": false})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/datasets/c1/document/create-by-text"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/datasets/c1/document/create-by-text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "document": {"id": "d1", "name": "docs.example.com"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/datasets/c1/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"doc_metadata": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/datasets/c1/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "f1", "name": "field"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/datasets/c1/documents/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "success"})))
        .mount(&server)
        .await;

    server
}

#[tokio::test]
async fn test_http_pipeline_end_to_end() {
    let dir = TempDir::new().unwrap();
    let root = page("/");
    let crawler = mock_crawler(json!([
        {"url": root.url, "success": true, "markdown": {"fit_markdown": root.markdown}},
        {"url": "https://docs.example.com/missing", "success": false, "error_message": "HTTP 404"},
    ]))
    .await;
    let store = mock_store().await;

    let config = create_test_config(
        dir.path(),
        &format!("{}/v1", store.uri()),
        &crawler.uri(),
        "",
    );
    let orchestrator =
        Orchestrator::new(&config, Collaborators::from_config(&config).unwrap(), false).unwrap();
    let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 1);
    assert!(summary.crawl_error.is_none());
    assert!(summary.failure_report.unwrap().exists());

    let created: Vec<_> = store
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path().ends_with("/document/create-by-text"))
        .collect();
    assert_eq!(created.len(), 2, "503 is retried once");
    let body: serde_json::Value = serde_json::from_slice(&created[1].body).unwrap();
    assert_eq!(body["name"], "docs.example.com");
    assert_eq!(body["doc_form"], "hierarchical_model");
    assert!(body["text"].as_str().unwrap().contains("Source: https://docs.example.com/"));
}

#[tokio::test]
async fn test_crawl_service_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let crawler = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/crawl"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&crawler)
        .await;
    let store = MockServer::start().await;

    let config = create_test_config(
        dir.path(),
        &format!("{}/v1", store.uri()),
        &crawler.uri(),
        "",
    );
    let orchestrator =
        Orchestrator::new(&config, Collaborators::from_config(&config).unwrap(), false).unwrap();
    let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.total(), 0);
    assert!(summary.crawl_error.unwrap().contains("400"));
    assert!(orchestrator.checkpoint_path().await.exists());
}

#[tokio::test]
async fn test_llm_categorizes_over_http() {
    let dir = TempDir::new().unwrap();
    let crawler = mock_crawler(json!([
        {"url": "https://docs.example.com/", "success": true, "markdown": "# EOS\n\nSmart contracts."},
    ]))
    .await;
    let store = mock_store().await;
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "test-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "EOS Network"}}]
        })))
        .expect(1..)
        .mount(&llm)
        .await;

    let config = create_test_config(
        dir.path(),
        &format!("{}/v1", store.uri()),
        &crawler.uri(),
        &format!("[llm]\nendpoint = \"{}\"\nmodel = \"test-model\"", llm.uri()),
    );
    let orchestrator =
        Orchestrator::new(&config, Collaborators::from_config(&config).unwrap(), false).unwrap();
    let summary = orchestrator.run(CancellationToken::new()).await.unwrap();
    assert_eq!(summary.successful, 1);

    let container_requests: Vec<_> = store
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.to_string() == "POST" && r.url.path() == "/v1/datasets")
        .collect();
    let body: serde_json::Value = serde_json::from_slice(&container_requests[0].body).unwrap();
    assert_eq!(body["name"], "eos");

    let mut checkpoint = ripple_ingest::Checkpoint::new(
        std::path::Path::new(&config.output.checkpoint_dir),
        &config.job.start_url,
        config.job.max_pages,
    );
    checkpoint.try_load().unwrap();
    assert_eq!(
        checkpoint.status("https://docs.example.com/"),
        Some(UrlStatus::Success)
    );
}
