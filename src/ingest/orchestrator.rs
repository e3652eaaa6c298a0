use super::pool::run_pool;
use super::summary::{RunCounters, RunSummary, SKIPPED_EXISTING, SKIPPED_LOW_VALUE};
use super::transform::build_document;
use crate::categorize::{Categorizer, CategoryMatcher};
use crate::config::Config;
use crate::crawler::{CrawlError, CrawlRequest, CrawledPage, Crawler, RemoteCrawler};
use crate::events::{EventSink, IngestEvent, TracingSink};
use crate::llm::{ChatCompletionClient, LlmClient};
use crate::mode::{ContentAnalyzer, LlmContentAnalyzer, ModeSelector, ProcessingMode};
use crate::output::write_markdown_summary;
use crate::resilience::{EndpointClass, ResilientClient};
use crate::state::{
    url_key, write_atomic, Checkpoint, CheckpointStats, FailureQueue, StateError, UrlStatus,
};
use crate::store::{ContainerCache, HttpKnowledgeStore, KnowledgeStore, Reservation};
use crate::url::{extract_domain, normalize_url, DocumentName};
use crate::IngestError;
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// External capabilities an [`Orchestrator`] drives
pub struct Collaborators {
    pub crawler: Arc<dyn Crawler>,
    pub store: Arc<dyn KnowledgeStore>,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub events: Arc<dyn EventSink>,
}

impl Collaborators {
    /// HTTP adapters for every configured service, reporting through `tracing`
    pub fn from_config(config: &Config) -> Result<Self, IngestError> {
        let llm: Option<Arc<dyn LlmClient>> = match &config.llm {
            Some(llm) => Some(Arc::new(ChatCompletionClient::new(llm)?)),
            None => None,
        };

        Ok(Self {
            crawler: Arc::new(RemoteCrawler::new(&config.crawler)?),
            store: Arc::new(HttpKnowledgeStore::new(&config.store)?),
            llm,
            events: Arc::new(TracingSink),
        })
    }
}

#[derive(Debug, Clone)]
struct JobSettings {
    start_url: String,
    max_pages: usize,
    max_depth: u32,
    workers: usize,
    save_interval: usize,
    max_retries: u32,
    preload_cache: bool,
    failure_report_path: PathBuf,
    summary_path: Option<PathBuf>,
}

/// Final result of handling one page
#[derive(Debug, Clone, PartialEq)]
enum PageOutcome {
    Success(String),
    Failed(String),
    Skipped { reason: &'static str, detail: String },
}

/// Everything the workers share
struct IngestContext {
    settings: JobSettings,
    checkpoint: Mutex<Checkpoint>,
    /// Held while a checkpoint snapshot is written; taken before the
    /// checkpoint lock is released so files land in snapshot order
    save_lock: Mutex<()>,
    failures: Mutex<FailureQueue>,
    /// Normalized URLs a worker is handling right now
    in_flight: std::sync::Mutex<HashSet<String>>,
    cache: ContainerCache,
    categorizer: Categorizer,
    selector: ModeSelector,
    client: Arc<ResilientClient>,
    events: Arc<dyn EventSink>,
    counters: RunCounters,
}

/// Writes a rendered checkpoint on the blocking pool
async fn write_checkpoint(path: PathBuf, json: String) -> Result<(), StateError> {
    let target = path.clone();
    tokio::task::spawn_blocking(move || write_atomic(&target, json.as_bytes()))
        .await
        .unwrap_or_else(|e| {
            Err(StateError::Io {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            })
        })?;
    tracing::debug!("Checkpoint saved to {}", path.display());
    Ok(())
}

impl IngestContext {
    /// Processes one crawled page and records the outcome
    ///
    /// With `redrive`, a page whose last recorded status is `failed` is
    /// processed again; otherwise any recorded page is left alone.
    ///
    /// Two copies of one URL never run at once; the later copy counts as
    /// already processed and leaves the outcome to the first.
    async fn handle_page(&self, page: CrawledPage, redrive: bool) {
        let key = url_key(&page.url);
        if !self.claim(&key) {
            tracing::debug!("{} is being handled by another worker", page.url);
            self.counters.record_already_processed();
            return;
        }

        let prior = self.checkpoint.lock().await.entry(&page.url).cloned();
        let already_done = match &prior {
            None => false,
            Some(entry) => !(redrive && entry.status.is_redrivable()),
        };

        if already_done {
            tracing::debug!("Already processed, skipping {}", page.url);
            self.counters.record_already_processed();
            if let Some(entry) = prior.as_ref().filter(|_| redrive) {
                self.settle_failure(&page.url, entry.status, entry.error.as_deref())
                    .await;
            }
        } else {
            let outcome = self.ingest(&page).await;
            self.record(&page.url, outcome).await;
        }

        self.in_flight().remove(&key);
    }

    fn claim(&self, key: &str) -> bool {
        self.in_flight().insert(key.to_string())
    }

    fn in_flight(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn ingest(&self, page: &CrawledPage) -> PageOutcome {
        if !page.success {
            return PageOutcome::Failed(
                page.error_message
                    .clone()
                    .unwrap_or_else(|| "crawl failed".to_string()),
            );
        }

        let name = match DocumentName::new(&page.url, page.title()) {
            Ok(name) => name,
            Err(e) => return PageOutcome::Failed(format!("unusable URL: {}", e)),
        };

        if let Some(container_id) = self.cache.lookup(name.key()) {
            return PageOutcome::Skipped {
                reason: SKIPPED_EXISTING,
                detail: format!("{} already stored in {}", name.key(), container_id),
            };
        }

        if page.markdown.trim().is_empty() {
            return PageOutcome::Skipped {
                reason: SKIPPED_LOW_VALUE,
                detail: "empty content".to_string(),
            };
        }

        let known = match self.cache.container_names().await {
            Ok(known) => known,
            Err(e) => return PageOutcome::Failed(format!("listing containers: {}", e)),
        };
        let (category, _) = self
            .categorizer
            .categorize(&page.url, &page.markdown, &known)
            .await;

        // the list may have grown since `known` was taken
        let matcher = self.categorizer.matcher();
        let resolved = self
            .cache
            .resolve_container_with(&category.name, |name, current| {
                matcher.resolve(name, current).name
            })
            .await;
        let (container_name, container_id) = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                return PageOutcome::Failed(format!("container '{}': {}", category.name, e))
            }
        };

        match self.cache.try_reserve(&container_id, name.key()).await {
            Ok(Reservation::Reserved) => {}
            Ok(Reservation::AlreadyExists { container_id }) => {
                return PageOutcome::Skipped {
                    reason: SKIPPED_EXISTING,
                    detail: format!("{} already stored in {}", name.key(), container_id),
                }
            }
            Err(e) => return PageOutcome::Failed(format!("listing documents: {}", e)),
        }

        let decision = self.selector.select(&page.url, &page.markdown).await;
        self.events.emit(IngestEvent::ModeDecision {
            url: page.url.clone(),
            decision: decision.clone(),
        });
        let Some(mode) = decision.mode() else {
            self.cache.release(&container_id, name.key());
            return PageOutcome::Skipped {
                reason: SKIPPED_LOW_VALUE,
                detail: decision.reason,
            };
        };

        let document = build_document(&name, &page.url, &page.markdown, mode);
        let store = self.cache.store();
        let created = self
            .client
            .execute(EndpointClass::DocumentCreate, || {
                store.create_document(&container_id, &document)
            })
            .await;

        match created {
            Ok(created) => {
                self.cache.commit(&container_id, name.key(), &created.id);
                self.assign_metadata(&container_id, &created.id, page, &name, mode)
                    .await;
                PageOutcome::Success(format!(
                    "{} -> {} ({}, {})",
                    name.key(),
                    container_name,
                    mode,
                    decision.branch.as_str()
                ))
            }
            Err(e) => {
                self.cache.release(&container_id, name.key());
                PageOutcome::Failed(e.to_string())
            }
        }
    }

    /// Best effort; a failure is reported but does not fail the page
    async fn assign_metadata(
        &self,
        container_id: &str,
        document_id: &str,
        page: &CrawledPage,
        name: &DocumentName,
        mode: ProcessingMode,
    ) {
        let domain = normalize_url(&page.url)
            .ok()
            .and_then(|u| extract_domain(&u))
            .unwrap_or_default();
        let values = [
            ("source_url", page.url.clone()),
            ("domain", domain),
            ("title", name.display_title().to_string()),
            ("processing_mode", mode.as_str().to_string()),
            ("ingested_at", Utc::now().to_rfc3339()),
        ];

        if let Err(e) = self
            .cache
            .assign_metadata(container_id, document_id, &values)
            .await
        {
            self.events.emit(IngestEvent::Warning(format!(
                "Metadata for {} not assigned: {}",
                page.url, e
            )));
        }
    }

    /// Writes an outcome to the checkpoint and failure queue
    async fn record(&self, url: &str, outcome: PageOutcome) {
        let (status, reason, detail) = match &outcome {
            PageOutcome::Success(detail) => (UrlStatus::Success, None, detail.clone()),
            PageOutcome::Failed(reason) => (UrlStatus::Failed, Some(reason.as_str()), reason.clone()),
            PageOutcome::Skipped { reason, detail } => {
                (UrlStatus::Skipped, Some(*reason), detail.clone())
            }
        };

        let due = {
            let mut checkpoint = self.checkpoint.lock().await;
            match &outcome {
                PageOutcome::Success(_) => checkpoint.mark_processed(url, true),
                PageOutcome::Failed(reason) => checkpoint.mark_failed(url, reason),
                PageOutcome::Skipped { reason, .. } => checkpoint.mark_skipped(url, reason),
            };

            let recorded = self.counters.record(status, reason);
            if recorded % self.settings.save_interval.max(1) == 0 {
                let rendered = checkpoint.to_json();
                let path = checkpoint.path().to_path_buf();
                let writing = self.save_lock.lock().await;
                Some((recorded, path, rendered, writing))
            } else {
                None
            }
        };

        if let Some((recorded, path, rendered, _writing)) = due {
            let saved = match rendered {
                Ok(json) => write_checkpoint(path, json).await,
                Err(e) => Err(e),
            };
            if let Err(e) = saved {
                self.events
                    .emit(IngestEvent::Error(format!("Checkpoint save failed: {}", e)));
            }
            let (successful, failed, skipped) = self.counters.snapshot();
            self.events.emit(IngestEvent::Progress {
                processed: recorded,
                successful,
                failed,
                skipped,
            });
        }

        self.settle_failure(url, status, reason).await;

        self.events.emit(IngestEvent::PageOutcome {
            url: url.to_string(),
            status,
            detail,
        });
    }

    /// Brings the failure queue in line with a URL's outcome
    ///
    /// Failures are queued. A success, or a skip because the document already
    /// exists, resolves a queued URL. A low-value skip resolves nothing: a
    /// queued URL keeps its record and the skip counts as one more retry.
    async fn settle_failure(&self, url: &str, status: UrlStatus, reason: Option<&str>) {
        let mut failures = self.failures.lock().await;
        let updated = match (status, reason) {
            (UrlStatus::Failed, reason) => failures.add(url, reason.unwrap_or("failed")),
            (UrlStatus::Success, _) | (UrlStatus::Skipped, Some(SKIPPED_EXISTING)) => {
                failures.remove(url).map(|_| ())
            }
            (UrlStatus::Skipped, reason) => {
                if failures.get(url).is_some() {
                    failures.add(url, reason.unwrap_or(SKIPPED_LOW_VALUE))
                } else {
                    Ok(())
                }
            }
        };
        if let Err(e) = updated {
            self.events
                .emit(IngestEvent::Error(format!("Failure queue update failed: {}", e)));
        }
    }
}

/// Drives a crawl job into the knowledge store
///
/// Pages flow crawler → bounded channel → worker pool. Each worker skips
/// pages the checkpoint already holds, deduplicates by canonical name,
/// categorizes, selects a processing mode and creates the document through
/// the resilient client. Every outcome lands in the checkpoint (saved every
/// `save-interval` pages and on exit) and failures in the failure queue.
pub struct Orchestrator {
    ctx: Arc<IngestContext>,
    crawler: Arc<dyn Crawler>,
}

impl Orchestrator {
    /// Sets up a job, loading prior state unless `fresh`
    ///
    /// # Errors
    ///
    /// Fails when a checkpoint or failure queue file exists but cannot be
    /// decoded; `fresh` ignores both.
    pub fn new(config: &Config, collaborators: Collaborators, fresh: bool) -> Result<Self, IngestError> {
        let Collaborators {
            crawler,
            store,
            llm,
            events,
        } = collaborators;

        let client = Arc::new(ResilientClient::new(&config.resilience, events.clone()));

        let mut checkpoint = Checkpoint::new(
            Path::new(&config.output.checkpoint_dir),
            &config.job.start_url,
            config.job.max_pages,
        );
        let failure_queue_path = PathBuf::from(&config.output.failure_queue_path);
        let failures = if fresh {
            events.emit(IngestEvent::Log(
                "Starting fresh; saved job state will be overwritten".to_string(),
            ));
            FailureQueue::new(failure_queue_path)
        } else {
            checkpoint.try_load()?;
            FailureQueue::open(failure_queue_path)?
        };

        let analyzer = llm.clone().map(|llm| {
            Arc::new(LlmContentAnalyzer::new(
                llm,
                client.clone(),
                config.mode.sample_chars,
            )) as Arc<dyn ContentAnalyzer>
        });

        let ctx = IngestContext {
            settings: JobSettings {
                start_url: config.job.start_url.clone(),
                max_pages: config.job.max_pages as usize,
                max_depth: config.job.max_depth,
                workers: config.job.workers.max(1),
                save_interval: config.output.save_interval.max(1),
                max_retries: config.output.max_retries,
                preload_cache: config.store.preload_cache,
                failure_report_path: PathBuf::from(&config.output.failure_report_path),
                summary_path: config.output.summary_path.as_ref().map(PathBuf::from),
            },
            checkpoint: Mutex::new(checkpoint),
            save_lock: Mutex::new(()),
            failures: Mutex::new(failures),
            in_flight: std::sync::Mutex::new(HashSet::new()),
            cache: ContainerCache::new(store, client.clone(), config.store.page_size),
            categorizer: Categorizer::new(
                CategoryMatcher::from_config(&config.categories),
                config.job.category.clone(),
                llm,
                client.clone(),
            ),
            selector: ModeSelector::from_config(&config.mode, analyzer),
            client,
            events,
            counters: RunCounters::default(),
        };

        Ok(Self {
            ctx: Arc::new(ctx),
            crawler,
        })
    }

    /// Current whole-job counters
    pub async fn statistics(&self) -> CheckpointStats {
        self.ctx.checkpoint.lock().await.statistics()
    }

    pub async fn checkpoint_path(&self) -> PathBuf {
        self.ctx.checkpoint.lock().await.path().to_path_buf()
    }

    pub fn client(&self) -> &ResilientClient {
        &self.ctx.client
    }

    /// Crawls the start URL and ingests every page
    ///
    /// Returns after the crawl is exhausted and all pages are handled, or
    /// after `cancel` fires and in-flight pages finish. The checkpoint and
    /// failure queue are flushed either way.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunSummary, IngestError> {
        let started = Instant::now();
        let settings = self.ctx.settings.clone();
        self.ctx.counters.reset();
        self.ctx.events.emit(IngestEvent::Log(format!(
            "Ingesting {} (max {} pages, {} workers)",
            settings.start_url, settings.max_pages, settings.workers
        )));

        self.preload_cache().await;

        let capacity = settings.workers * 2;
        let (found_tx, mut found_rx) = mpsc::channel::<CrawledPage>(capacity);
        let (work_tx, work_rx) = mpsc::channel::<CrawledPage>(capacity);

        let crawl_task = {
            let crawler = self.crawler.clone();
            let request = CrawlRequest::new(
                settings.start_url.clone(),
                settings.max_pages,
                settings.max_depth,
            );
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    result = crawler.crawl(&request, found_tx) => result,
                    _ = cancel.cancelled() => Ok(()),
                }
            })
        };

        // records discoveries as pending before handing pages to the workers
        let feeder = {
            let ctx = self.ctx.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let page = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        page = found_rx.recv() => page,
                    };
                    let Some(page) = page else { break };

                    ctx.checkpoint.lock().await.add_pending([page.url.as_str()]);
                    if work_tx.send(page).await.is_err() {
                        break;
                    }
                }
            })
        };

        let ctx = self.ctx.clone();
        run_pool(settings.workers, work_rx, cancel.clone(), move |page| {
            let ctx = ctx.clone();
            async move { ctx.handle_page(page, false).await }
        })
        .await;

        let crawl_error = match crawl_task.await {
            Ok(Ok(())) | Ok(Err(CrawlError::ReceiverClosed)) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(e) => Some(format!("crawl task failed: {}", e)),
        };
        if let Some(error) = &crawl_error {
            self.ctx.events.emit(IngestEvent::Error(error.clone()));
        }
        if let Err(e) = feeder.await {
            tracing::error!("Page feeder failed: {}", e);
        }

        self.finish(started, cancel.is_cancelled(), crawl_error).await
    }

    /// Re-crawls and re-processes retryable failure queue entries
    ///
    /// Each URL is fetched on its own (one page, no links followed). Entries
    /// that have used up `max-retries` are left for the report.
    pub async fn redrive_failures(&self, cancel: CancellationToken) -> Result<RunSummary, IngestError> {
        let started = Instant::now();
        self.ctx.counters.reset();

        self.preload_cache().await;
        let retryable = self
            .ctx
            .failures
            .lock()
            .await
            .get_retryable(self.ctx.settings.max_retries);
        self.ctx.events.emit(IngestEvent::Log(format!(
            "Re-driving {} failed URL(s)",
            retryable.len()
        )));

        for record in retryable {
            if cancel.is_cancelled() {
                break;
            }

            let (tx, mut rx) = mpsc::channel(4);
            let request = CrawlRequest::single(record.url.clone());
            let collect = async move {
                let mut pages = Vec::new();
                while let Some(page) = rx.recv().await {
                    pages.push(page);
                }
                pages
            };
            let (crawled, pages) = tokio::join!(self.crawler.crawl(&request, tx), collect);

            if pages.is_empty() {
                let reason = match crawled {
                    Err(e) => e.to_string(),
                    Ok(()) => "crawl returned no page".to_string(),
                };
                self.ctx.record(&record.url, PageOutcome::Failed(reason)).await;
                continue;
            }

            for page in pages {
                self.ctx.handle_page(page, true).await;
            }
        }

        self.finish(started, cancel.is_cancelled(), None).await
    }

    async fn preload_cache(&self) {
        if !self.ctx.settings.preload_cache {
            return;
        }
        if let Err(e) = self.ctx.cache.preload().await {
            self.ctx.events.emit(IngestEvent::Warning(format!(
                "Cache preload failed, loading lazily: {}",
                e
            )));
        }
    }

    async fn finish(
        &self,
        started: Instant,
        cancelled: bool,
        crawl_error: Option<String>,
    ) -> Result<RunSummary, IngestError> {
        let settings = &self.ctx.settings;

        let checkpoint = {
            let mut checkpoint = self.ctx.checkpoint.lock().await;
            let json = checkpoint.to_json()?;
            let path = checkpoint.path().to_path_buf();
            let stats = checkpoint.statistics();
            let _writing = self.ctx.save_lock.lock().await;
            drop(checkpoint);
            write_checkpoint(path, json).await?;
            stats
        };

        let failure_report = {
            let failures = self.ctx.failures.lock().await;
            failures.save()?;
            if failures.is_empty() {
                None
            } else {
                failures.export_report(&settings.failure_report_path)?;
                Some(settings.failure_report_path.clone())
            }
        };

        let mut summary = RunSummary {
            start_url: settings.start_url.clone(),
            checkpoint,
            elapsed: started.elapsed(),
            cancelled,
            crawl_error,
            failure_report,
            ..RunSummary::default()
        };
        self.ctx.counters.fill(&mut summary);

        if let Some(path) = &settings.summary_path {
            if let Err(e) = write_markdown_summary(&summary, path) {
                self.ctx.events.emit(IngestEvent::Warning(format!(
                    "Could not write summary to {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        self.ctx.events.emit(IngestEvent::Log(format!(
            "{} in {:.1}s: {} ok, {} failed, {} skipped, {} pending",
            if cancelled { "Cancelled" } else { "Finished" },
            summary.elapsed.as_secs_f64(),
            summary.successful,
            summary.failed,
            summary.skipped,
            summary.remaining()
        )));
        Ok(summary)
    }
}
