//! Shared HTTP plumbing for the remote adapters

use crate::resilience::RemoteError;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

/// User agent sent by every adapter
pub const USER_AGENT: &str = concat!("ripple-ingest/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client used by the crawler, store and LLM adapters
///
/// # Arguments
///
/// * `timeout` - Whole-request timeout
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Reads a response as JSON, classifying failures
///
/// Non-success statuses become [`RemoteError::Status`] carrying the body;
/// a success body that is not JSON is [`RemoteError::Unparsable`]. An empty
/// success body reads as `null`.
pub async fn read_json(response: Response) -> Result<Value, RemoteError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(RemoteError::from_status(status.as_u16(), &body));
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(120).collect();
        RemoteError::Unparsable(format!("{} in body: {}", e, preview))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(Duration::from_secs(5)).is_ok());
        assert!(USER_AGENT.starts_with("ripple-ingest/"));
    }

    #[tokio::test]
    async fn test_read_json_classifies_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id": "1"}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client = build_http_client(Duration::from_secs(5)).unwrap();
        let get = |p: &str| client.get(format!("{}{}", server.uri(), p)).send();

        let ok = read_json(get("/ok").await.unwrap()).await.unwrap();
        assert_eq!(ok["id"], "1");

        let busy = read_json(get("/busy").await.unwrap()).await.unwrap_err();
        assert!(matches!(busy, RemoteError::Status { status: 503, .. }));
        assert!(busy.is_retryable());

        let html = read_json(get("/html").await.unwrap()).await.unwrap_err();
        assert!(matches!(html, RemoteError::Unparsable(_)));
    }
}
