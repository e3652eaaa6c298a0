//! Crawl sources
//!
//! The page fetching and rendering engine lives outside this crate. A
//! [`Crawler`] turns a [`CrawlRequest`] into a finite stream of
//! [`CrawledPage`]s pushed into a bounded channel; the ingest workers drain
//! the other end.

mod remote;

pub use remote::{parse_crawl_response, RemoteCrawler};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Crawl service failures
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Crawl request failed: {0}")]
    Request(#[from] crate::resilience::RemoteError),

    #[error("Crawl response not understood: {0}")]
    Unparsable(String),

    #[error("Page receiver closed before the crawl finished")]
    ReceiverClosed,
}

/// One page produced by the crawler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawledPage {
    pub url: String,
    pub success: bool,
    pub markdown: String,
    pub error_message: Option<String>,
}

impl CrawledPage {
    pub fn ok(url: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: true,
            markdown: markdown.into(),
            error_message: None,
        }
    }

    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: false,
            markdown: String::new(),
            error_message: Some(error.into()),
        }
    }

    /// First markdown heading, if any
    pub fn title(&self) -> Option<&str> {
        self.markdown
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with('#'))
            .map(|line| line.trim_start_matches('#').trim())
            .filter(|title| !title.is_empty())
    }
}

/// What to crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    pub urls: Vec<String>,
    pub max_pages: usize,
    pub max_depth: u32,
}

impl CrawlRequest {
    pub fn new(start_url: impl Into<String>, max_pages: usize, max_depth: u32) -> Self {
        Self {
            urls: vec![start_url.into()],
            max_pages,
            max_depth,
        }
    }

    /// Fetches exactly one page without following links
    pub fn single(url: impl Into<String>) -> Self {
        Self::new(url, 1, 0)
    }
}

/// Source of crawled pages
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Sends every page of the crawl to `pages`, then returns
    ///
    /// Stops early with [`CrawlError::ReceiverClosed`] once the receiver is
    /// dropped.
    async fn crawl(
        &self,
        request: &CrawlRequest,
        pages: mpsc::Sender<CrawledPage>,
    ) -> Result<(), CrawlError>;
}

/// Crawler replaying a fixed list of pages
///
/// Pages whose URL is in `request.urls` are sent first, then the rest in
/// order, up to `max_pages`. Used by tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticCrawler {
    pages: Vec<CrawledPage>,
}

impl StaticCrawler {
    pub fn new(pages: Vec<CrawledPage>) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl Crawler for StaticCrawler {
    async fn crawl(
        &self,
        request: &CrawlRequest,
        pages: mpsc::Sender<CrawledPage>,
    ) -> Result<(), CrawlError> {
        let (seeds, rest): (Vec<&CrawledPage>, Vec<&CrawledPage>) = self
            .pages
            .iter()
            .partition(|p| request.urls.contains(&p.url));

        // a single-page request only returns seeds
        let ordered: Vec<&CrawledPage> = if request.max_depth == 0 {
            seeds
        } else {
            seeds.into_iter().chain(rest).collect()
        };

        for page in ordered.into_iter().take(request.max_pages) {
            pages
                .send(page.clone())
                .await
                .map_err(|_| CrawlError::ReceiverClosed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_heading() {
        let page = CrawledPage::ok("https://x.com/a", "intro\n\n## Getting Started\nbody");
        assert_eq!(page.title(), Some("Getting Started"));
        assert_eq!(CrawledPage::ok("https://x.com/b", "no heading").title(), None);
        assert_eq!(CrawledPage::ok("https://x.com/c", "#\n# Real").title(), Some("Real"));
    }

    #[tokio::test]
    async fn test_static_crawler_respects_max_pages() {
        let crawler = StaticCrawler::new(vec![
            CrawledPage::ok("https://x.com/a", "a"),
            CrawledPage::ok("https://x.com/b", "b"),
            CrawledPage::ok("https://x.com/c", "c"),
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        crawler
            .crawl(&CrawlRequest::new("https://x.com/b", 2, 3), tx)
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().url, "https://x.com/b");
        assert_eq!(rx.recv().await.unwrap().url, "https://x.com/a");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_single_request_only_returns_seed() {
        let crawler = StaticCrawler::new(vec![
            CrawledPage::ok("https://x.com/a", "a"),
            CrawledPage::failed("https://x.com/b", "timeout"),
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        crawler
            .crawl(&CrawlRequest::single("https://x.com/b"), tx)
            .await
            .unwrap();

        let page = rx.recv().await.unwrap();
        assert!(!page.success);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_receiver_stops_crawl() {
        let crawler = StaticCrawler::new(vec![CrawledPage::ok("https://x.com/a", "a")]);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = crawler
            .crawl(&CrawlRequest::new("https://x.com/a", 5, 1), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::ReceiverClosed));
    }
}
