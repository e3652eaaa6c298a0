//! Job-level behavior: dedup, categorization, resume, cancellation, re-drive

use crate::{create_test_config, page};
use async_trait::async_trait;
use ripple_ingest::crawler::{CrawlError, CrawlRequest, CrawledPage, Crawler, StaticCrawler};
use ripple_ingest::events::{IngestEvent, RecordingSink};
use ripple_ingest::ingest::{Collaborators, SKIPPED_EXISTING};
use ripple_ingest::llm::{LlmClient, MockLlm};
use ripple_ingest::resilience::RemoteError;
use ripple_ingest::state::{checkpoint_path, Checkpoint, FailureQueue};
use ripple_ingest::store::{
    InMemoryStore, KnowledgeStore, Listing, MetadataField, MetadataValue, NewDocument,
    RemoteContainer, RemoteDocument,
};
use ripple_ingest::{Config, IngestError, Orchestrator, UrlStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const STORE: &str = "http://store.local/v1";
const CRAWLER: &str = "http://crawler.local";

fn job_config(dir: &Path, extra: &str) -> Config {
    create_test_config(dir, STORE, CRAWLER, extra)
}

fn static_job(pages: Vec<CrawledPage>, store: Arc<InMemoryStore>) -> Collaborators {
    Collaborators {
        crawler: Arc::new(StaticCrawler::new(pages)),
        store,
        llm: None,
        events: Arc::new(RecordingSink::new()),
    }
}

/// Sends its pages, cancels the job, then never finishes
struct CancellingCrawler {
    pages: Vec<CrawledPage>,
    cancel: CancellationToken,
}

#[async_trait]
impl Crawler for CancellingCrawler {
    async fn crawl(
        &self,
        _request: &CrawlRequest,
        pages: mpsc::Sender<CrawledPage>,
    ) -> Result<(), CrawlError> {
        for page in &self.pages {
            pages
                .send(page.clone())
                .await
                .map_err(|_| CrawlError::ReceiverClosed)?;
        }
        self.cancel.cancel();
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// LLM that takes a while to answer
struct SlowLlm {
    inner: MockLlm,
    delay: Duration,
}

#[async_trait]
impl LlmClient for SlowLlm {
    async fn complete(&self, prompt: &str) -> Result<String, RemoteError> {
        tokio::time::sleep(self.delay).await;
        self.inner.complete(prompt).await
    }
}

/// In-memory store whose document creation takes a while
struct SlowStore {
    inner: Arc<InMemoryStore>,
    delay: Duration,
}

#[async_trait]
impl KnowledgeStore for SlowStore {
    async fn list_containers(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<Listing<RemoteContainer>, RemoteError> {
        self.inner.list_containers(page, limit).await
    }

    async fn create_container(&self, name: &str) -> Result<RemoteContainer, RemoteError> {
        self.inner.create_container(name).await
    }

    async fn list_documents(
        &self,
        container_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Listing<RemoteDocument>, RemoteError> {
        self.inner.list_documents(container_id, page, limit).await
    }

    async fn create_document(
        &self,
        container_id: &str,
        document: &NewDocument,
    ) -> Result<RemoteDocument, RemoteError> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_document(container_id, document).await
    }

    async fn delete_document(&self, container_id: &str, document_id: &str) -> Result<(), RemoteError> {
        self.inner.delete_document(container_id, document_id).await
    }

    async fn list_metadata_fields(&self, container_id: &str) -> Result<Vec<MetadataField>, RemoteError> {
        self.inner.list_metadata_fields(container_id).await
    }

    async fn create_metadata_field(
        &self,
        container_id: &str,
        name: &str,
    ) -> Result<MetadataField, RemoteError> {
        self.inner.create_metadata_field(container_id, name).await
    }

    async fn assign_metadata(
        &self,
        container_id: &str,
        document_id: &str,
        values: &[MetadataValue],
    ) -> Result<(), RemoteError> {
        self.inner.assign_metadata(container_id, document_id, values).await
    }
}

fn slow_store_job(pages: Vec<CrawledPage>, store: Arc<InMemoryStore>) -> Collaborators {
    Collaborators {
        crawler: Arc::new(StaticCrawler::new(pages)),
        store: Arc::new(SlowStore {
            inner: store,
            delay: Duration::from_millis(20),
        }),
        llm: None,
        events: Arc::new(RecordingSink::new()),
    }
}

#[tokio::test]
async fn test_same_url_twice_creates_one_document() {
    let dir = TempDir::new().unwrap();
    let config = job_config(dir.path(), "");
    let store = Arc::new(InMemoryStore::new());

    // the second copy differs only in ways normalization removes
    let duplicate = CrawledPage::ok("https://www.docs.example.com/guide/", "# Guide\n\nAgain.");
    let orchestrator = Orchestrator::new(
        &config,
        static_job(vec![page("/guide"), duplicate], store.clone()),
        false,
    )
    .unwrap();
    let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(store.all_documents().len(), 1);
    assert_eq!(store.create_calls(), 1);
    assert_eq!(summary.successful + summary.already_processed + summary.skipped, 2);
}

#[tokio::test]
async fn test_parallel_workers_create_one_document_per_canonical_name() {
    let dir = TempDir::new().unwrap();
    let mut config = job_config(dir.path(), "");
    config.job.workers = 2;
    let store = Arc::new(InMemoryStore::new());

    // different checkpoint keys, same canonical name
    let plain = CrawledPage::ok("http://docs.example.com/guide", "# Guide\n\nPlain.");
    let orchestrator = Orchestrator::new(
        &config,
        slow_store_job(vec![page("/guide"), plain], store.clone()),
        false,
    )
    .unwrap();
    let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(store.create_calls(), 1);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.skip_reasons[SKIPPED_EXISTING], 1);
}

#[tokio::test]
async fn test_parallel_copies_of_one_url_record_one_outcome() {
    let dir = TempDir::new().unwrap();
    let mut config = job_config(dir.path(), "");
    config.job.workers = 2;
    let store = Arc::new(InMemoryStore::new());

    let orchestrator = Orchestrator::new(
        &config,
        slow_store_job(vec![page("/guide"), page("/guide/")], store.clone()),
        false,
    )
    .unwrap();
    let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(store.create_calls(), 1);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.already_processed, 1);
    assert_eq!(summary.checkpoint.skipped, 0);

    let mut checkpoint = Checkpoint::new(
        Path::new(&config.output.checkpoint_dir),
        &config.job.start_url,
        config.job.max_pages,
    );
    checkpoint.try_load().unwrap();
    assert_eq!(
        checkpoint.status("https://docs.example.com/guide"),
        Some(UrlStatus::Success)
    );
}

#[tokio::test]
async fn test_existing_document_in_store_is_skipped() {
    let dir = TempDir::new().unwrap();
    let mut config = job_config(dir.path(), "");
    config.store.preload_cache = true;
    let store = Arc::new(InMemoryStore::new());
    store.seed_container("legacy", &["docs.example.com/old"]);

    let orchestrator = Orchestrator::new(
        &config,
        static_job(vec![page("/old"), page("/new")], store.clone()),
        false,
    )
    .unwrap();
    let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.successful, 1);
    assert_eq!(summary.skip_reasons[SKIPPED_EXISTING], 1);
    assert_eq!(store.create_calls(), 1);
}

#[tokio::test]
async fn test_category_variants_share_one_container() {
    let dir = TempDir::new().unwrap();
    let config = job_config(
        dir.path(),
        "[llm]\nendpoint = \"http://llm.local\"\nmodel = \"test\"",
    );
    let store = Arc::new(InMemoryStore::new());

    let variants = ["EOS Network", "eos_network", "eos-network", "EOSIO", "eos"];
    let mut llm = MockLlm::new("eos");
    let mut pages = Vec::new();
    for (i, label) in variants.iter().enumerate() {
        let path = format!("/topic-{}", i);
        llm = llm.with_rule(format!("docs.example.com{}", path), *label);
        pages.push(page(&path));
    }

    let orchestrator = Orchestrator::new(
        &config,
        Collaborators {
            crawler: Arc::new(StaticCrawler::new(pages)),
            store: store.clone(),
            llm: Some(Arc::new(llm)),
            events: Arc::new(RecordingSink::new()),
        },
        false,
    )
    .unwrap();
    let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.successful, 5);
    let containers = store.containers();
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].name, "eos");
    assert_eq!(store.documents(&containers[0].id).len(), 5);
}

#[tokio::test]
async fn test_racing_category_variants_share_one_container() {
    let dir = TempDir::new().unwrap();
    let mut config = job_config(
        dir.path(),
        "[llm]\nendpoint = \"http://llm.local\"\nmodel = \"test\"",
    );
    config.job.workers = 2;
    let store = Arc::new(InMemoryStore::new());

    // both workers list containers before either label comes back
    let llm = SlowLlm {
        inner: MockLlm::new("kubernetes")
            .with_rule("docs.example.com/one", "kubernetes")
            .with_rule("docs.example.com/two", "kubernets"),
        delay: Duration::from_millis(50),
    };
    let orchestrator = Orchestrator::new(
        &config,
        Collaborators {
            crawler: Arc::new(StaticCrawler::new(vec![page("/one"), page("/two")])),
            store: store.clone(),
            llm: Some(Arc::new(llm)),
            events: Arc::new(RecordingSink::new()),
        },
        false,
    )
    .unwrap();
    let summary = orchestrator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.successful, 2);
    let containers = store.containers();
    assert_eq!(containers.len(), 1, "containers: {:?}", containers);
    assert_eq!(store.documents(&containers[0].id).len(), 2);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = job_config(dir.path(), "");
    let store = Arc::new(InMemoryStore::new());
    let pages = vec![page("/"), page("/a"), page("/b")];

    let first = Orchestrator::new(&config, static_job(pages.clone(), store.clone()), false)
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();
    let second = Orchestrator::new(&config, static_job(pages, store.clone()), false)
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.successful, 3);
    assert_eq!(second.successful, 0);
    assert_eq!(second.already_processed, 3);
    assert_eq!(store.create_calls(), 3);
    assert_eq!(first.checkpoint, second.checkpoint);
}

/// A crawl with one failing page and one duplicate of an earlier page
fn mixed_pages() -> Vec<CrawledPage> {
    vec![
        page("/"),
        page("/a"),
        CrawledPage::failed("https://docs.example.com/broken", "HTTP 500"),
        page("/b"),
        CrawledPage::ok("http://docs.example.com/a", "# A\n\nSame page over http."),
    ]
}

#[tokio::test]
async fn test_cancel_flushes_checkpoint_and_resume_completes() {
    let dir = TempDir::new().unwrap();
    let mut config = job_config(dir.path(), "");
    config.output.save_interval = 100;
    let store = Arc::new(InMemoryStore::new());
    let pages = mixed_pages();

    let cancel = CancellationToken::new();
    let events = Arc::new(RecordingSink::new());
    let interrupted = Orchestrator::new(
        &config,
        Collaborators {
            crawler: Arc::new(CancellingCrawler {
                pages: pages.clone(),
                cancel: cancel.clone(),
            }),
            store: store.clone(),
            llm: None,
            events: events.clone(),
        },
        false,
    )
    .unwrap();
    let first = interrupted.run(cancel).await.unwrap();

    assert!(first.cancelled);
    let path = checkpoint_path(
        Path::new(&config.output.checkpoint_dir),
        &config.job.start_url,
    );
    assert!(path.exists());

    let mut on_disk = Checkpoint::new(
        Path::new(&config.output.checkpoint_dir),
        &config.job.start_url,
        config.job.max_pages,
    );
    assert!(on_disk.try_load().unwrap());
    assert_eq!(on_disk.statistics(), first.checkpoint);
    assert_eq!(on_disk.statistics().successful, first.successful);

    let second = Orchestrator::new(&config, static_job(pages.clone(), store.clone()), false)
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert!(!second.cancelled);
    assert_eq!(second.remaining(), 0);
    assert_eq!(store.all_documents().len(), 3);

    // the interruption must not change what the job ends up with
    let baseline_dir = TempDir::new().unwrap();
    let baseline_config = job_config(baseline_dir.path(), "");
    let baseline = Orchestrator::new(
        &baseline_config,
        static_job(pages, Arc::new(InMemoryStore::new())),
        false,
    )
    .unwrap()
    .run(CancellationToken::new())
    .await
    .unwrap();

    assert_eq!(baseline.checkpoint.successful, 3);
    assert_eq!(baseline.checkpoint.failed, 1);
    assert_eq!(baseline.checkpoint.skipped, 1);
    assert_eq!(second.checkpoint, baseline.checkpoint);
    assert_eq!(first.successful + second.successful, baseline.successful);
    assert_eq!(first.failed + second.failed, baseline.failed);
    assert_eq!(first.skipped + second.skipped, baseline.skipped);
    assert_eq!(
        FailureQueue::open(&config.output.failure_queue_path).unwrap().len(),
        FailureQueue::open(&baseline_config.output.failure_queue_path)
            .unwrap()
            .len()
    );
}

#[tokio::test]
async fn test_corrupt_checkpoint_is_fatal_unless_fresh() {
    let dir = TempDir::new().unwrap();
    let config = job_config(dir.path(), "");
    let path = checkpoint_path(
        Path::new(&config.output.checkpoint_dir),
        &config.job.start_url,
    );
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    let store = Arc::new(InMemoryStore::new());
    let result = Orchestrator::new(&config, static_job(vec![page("/")], store.clone()), false);
    assert!(matches!(result, Err(IngestError::State(_))));

    let summary = Orchestrator::new(&config, static_job(vec![page("/")], store.clone()), true)
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.successful, 1);

    // the fresh run replaced the corrupt file
    let mut reloaded = Checkpoint::new(
        Path::new(&config.output.checkpoint_dir),
        &config.job.start_url,
        config.job.max_pages,
    );
    assert!(reloaded.try_load().unwrap());
}

#[tokio::test]
async fn test_redrive_recovers_failed_page() {
    let dir = TempDir::new().unwrap();
    let config = job_config(dir.path(), "");
    let store = Arc::new(InMemoryStore::new());
    store.fail_next_creates([RemoteError::Permanent("quota exceeded".to_string())]);
    let pages = vec![page("/"), page("/a")];

    let first = Orchestrator::new(&config, static_job(pages.clone(), store.clone()), false)
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.failed, 1);
    assert!(first.failure_report.is_some());

    let queue = FailureQueue::open(&config.output.failure_queue_path).unwrap();
    assert_eq!(queue.len(), 1);
    let failed_url = queue.records()[0].url.clone();

    let events = Arc::new(RecordingSink::new());
    let redrive = Orchestrator::new(
        &config,
        Collaborators {
            crawler: Arc::new(StaticCrawler::new(pages)),
            store: store.clone(),
            llm: None,
            events: events.clone(),
        },
        false,
    )
    .unwrap();
    let second = redrive.redrive_failures(CancellationToken::new()).await.unwrap();

    assert_eq!(second.successful, 1);
    assert!(second.failure_report.is_none());
    assert!(FailureQueue::open(&config.output.failure_queue_path)
        .unwrap()
        .is_empty());
    assert_eq!(store.all_documents().len(), 2);

    let mut checkpoint = Checkpoint::new(
        Path::new(&config.output.checkpoint_dir),
        &config.job.start_url,
        config.job.max_pages,
    );
    checkpoint.try_load().unwrap();
    assert_eq!(checkpoint.status(&failed_url), Some(UrlStatus::Success));
    assert_eq!(
        events.count(|e| matches!(e, IngestEvent::PageOutcome { status: UrlStatus::Success, .. })),
        1
    );
}

#[tokio::test]
async fn test_redrive_fetches_the_url_as_crawled() {
    let dir = TempDir::new().unwrap();
    let config = job_config(dir.path(), "");
    let store = Arc::new(InMemoryStore::new());
    store.fail_next_creates([RemoteError::Permanent("quota exceeded".to_string())]);

    let crawled = "https://www.docs.example.com/a?source=sidebar";
    let pages = vec![
        CrawledPage::ok(crawled, "# A\n\nLinked from the sidebar."),
        page("/b"),
    ];

    let first = Orchestrator::new(&config, static_job(pages.clone(), store.clone()), false)
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.failed, 1);

    let queue = FailureQueue::open(&config.output.failure_queue_path).unwrap();
    assert_eq!(queue.records()[0].url, crawled);

    // the crawler only knows the page under the address it was found at
    let second = Orchestrator::new(&config, static_job(pages, store.clone()), false)
        .unwrap()
        .redrive_failures(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(second.successful, 1);
    assert!(FailureQueue::open(&config.output.failure_queue_path)
        .unwrap()
        .is_empty());
    assert_eq!(store.all_documents().len(), 2);
}

#[tokio::test]
async fn test_redrive_without_page_keeps_failure() {
    let dir = TempDir::new().unwrap();
    let config = job_config(dir.path(), "");
    let store = Arc::new(InMemoryStore::new());

    let first = Orchestrator::new(
        &config,
        static_job(
            vec![CrawledPage::failed("https://docs.example.com/gone", "HTTP 404")],
            store.clone(),
        ),
        false,
    )
    .unwrap()
    .run(CancellationToken::new())
    .await
    .unwrap();
    assert_eq!(first.failed, 1);

    // the crawler no longer returns anything for the URL
    let second = Orchestrator::new(&config, static_job(vec![], store), false)
        .unwrap()
        .redrive_failures(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(second.failed, 1);
    let queue = FailureQueue::open(&config.output.failure_queue_path).unwrap();
    assert_eq!(queue.records()[0].retry_count, 1);
}
