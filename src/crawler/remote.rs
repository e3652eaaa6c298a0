use super::{CrawlError, CrawlRequest, CrawledPage, Crawler};
use crate::config::CrawlerConfig;
use crate::http::{build_http_client, read_json};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;

const RESULT_KEYS: &[&str] = &["results", "pages", "data"];
const MARKDOWN_KEYS: &[&str] = &["fit_markdown", "raw_markdown", "markdown"];
const ERROR_KEYS: &[&str] = &["error_message", "error"];

/// Client of an HTTP crawl service
///
/// Sends `{urls, max_pages, max_depth}` to `POST {endpoint}/crawl` and streams
/// the returned pages into the channel in response order.
pub struct RemoteCrawler {
    endpoint: String,
    client: reqwest::Client,
}

impl RemoteCrawler {
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client: build_http_client(Duration::from_secs(config.timeout_secs))?,
        })
    }
}

#[async_trait]
impl Crawler for RemoteCrawler {
    async fn crawl(
        &self,
        request: &CrawlRequest,
        pages: mpsc::Sender<CrawledPage>,
    ) -> Result<(), CrawlError> {
        tracing::info!(
            "Requesting crawl of {} (max {} pages, depth {})",
            request.urls.join(", "),
            request.max_pages,
            request.max_depth
        );

        let response = self
            .client
            .post(format!("{}/crawl", self.endpoint))
            .json(&json!({
                "urls": request.urls,
                "max_pages": request.max_pages,
                "max_depth": request.max_depth,
            }))
            .send()
            .await
            .map_err(crate::resilience::RemoteError::from)?;
        let body = read_json(response).await?;

        let crawled = parse_crawl_response(&body)?;
        tracing::debug!("Crawl service returned {} page(s)", crawled.len());

        for page in crawled.into_iter().take(request.max_pages) {
            pages
                .send(page)
                .await
                .map_err(|_| CrawlError::ReceiverClosed)?;
        }
        Ok(())
    }
}

/// Parses a crawl service response into pages
///
/// Accepts a bare array or one under `results`/`pages`/`data`. Entries
/// without a URL are dropped.
pub fn parse_crawl_response(body: &Value) -> Result<Vec<CrawledPage>, CrawlError> {
    let items = match body {
        Value::Array(items) => items,
        _ => RESULT_KEYS
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_array))
            .ok_or_else(|| {
                CrawlError::Unparsable(format!(
                    "expected one of {} in crawl response",
                    RESULT_KEYS.join("/")
                ))
            })?,
    };

    Ok(items.iter().filter_map(parse_page).collect())
}

fn parse_page(value: &Value) -> Option<CrawledPage> {
    let url = value.get("url").and_then(Value::as_str)?.to_string();
    let markdown = value.get("markdown").map(markdown_text).unwrap_or_default();
    let error_message = ERROR_KEYS
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|e| !e.is_empty())
        .map(str::to_string);
    let success = value
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(error_message.is_none());

    Some(CrawledPage {
        url,
        success,
        markdown,
        error_message,
    })
}

/// Markdown may be a plain string or an object with several renditions
fn markdown_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) => MARKDOWN_KEYS
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}
