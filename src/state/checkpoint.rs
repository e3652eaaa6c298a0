use super::{read_optional, url_key, write_atomic, StateError, StateResult, UrlStatus};
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Record of one processed URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedEntry {
    pub status: UrlStatus,
    pub timestamp: DateTime<Utc>,

    /// Failure detail, or the skip reason for skipped URLs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default = "one")]
    pub attempts: u32,
}

fn one() -> u32 {
    1
}

/// Counters derived from the processed map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointStats {
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_discovered: usize,
    #[serde(default)]
    pub pending: usize,
}

impl CheckpointStats {
    pub fn processed(&self) -> usize {
        self.successful + self.failed + self.skipped
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckpointData {
    start_url: String,
    max_pages: u32,
    started_at: DateTime<Utc>,
    #[serde(default)]
    pending_urls: IndexSet<String>,
    #[serde(default)]
    processed_urls: IndexMap<String, ProcessedEntry>,
    /// Snapshot for humans reading the file; recomputed on load
    #[serde(default)]
    stats: CheckpointStats,
}

/// Durable progress of one crawl job
///
/// A URL lives in exactly one of `pending` and `processed`. Processed entries
/// are never removed, and the counters are always derived from them, so a
/// hand-edited or partially written snapshot cannot drift from the map.
///
/// URLs are keyed by their normalized form; `https://x.com/a/` and
/// `https://x.com/a` are the same entry.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
    data: CheckpointData,
}

/// Location of the checkpoint file for a start URL
///
/// `<dir>/checkpoint_<h>.json`, where `h` is the first 16 hex characters of
/// the SHA-256 of the normalized start URL.
pub fn checkpoint_path(dir: &Path, start_url: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(url_key(start_url).as_bytes());
    let digest = hex::encode(hasher.finalize());
    dir.join(format!("checkpoint_{}.json", &digest[..16]))
}

impl Checkpoint {
    /// Creates empty state for a job; nothing is read or written yet
    pub fn new(dir: &Path, start_url: &str, max_pages: u32) -> Self {
        Self {
            path: checkpoint_path(dir, start_url),
            data: CheckpointData {
                start_url: url_key(start_url),
                max_pages,
                started_at: Utc::now(),
                pending_urls: IndexSet::new(),
                processed_urls: IndexMap::new(),
                stats: CheckpointStats::default(),
            },
        }
    }

    /// Loads prior state for this job from disk
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - prior state for the same start URL was loaded
    /// * `Ok(false)` - no file, or the file belongs to another start URL
    /// * `Err(StateError::CorruptCheckpoint)` - the file exists but cannot be decoded
    pub fn try_load(&mut self) -> StateResult<bool> {
        let Some(content) = read_optional(&self.path)? else {
            return Ok(false);
        };

        let loaded: CheckpointData =
            serde_json::from_str(&content).map_err(|e| StateError::CorruptCheckpoint {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        if url_key(&loaded.start_url) != self.data.start_url {
            tracing::warn!(
                "Checkpoint {} belongs to {}, ignoring it",
                self.path.display(),
                loaded.start_url
            );
            return Ok(false);
        }

        let max_pages = self.data.max_pages;
        self.data = loaded;
        self.data.max_pages = max_pages;

        // repair hand edits that left a URL in both sets
        let processed = &self.data.processed_urls;
        self.data.pending_urls.retain(|url| !processed.contains_key(url));
        self.data.stats = self.statistics();

        tracing::info!(
            "Resuming from checkpoint: {} processed, {} pending",
            self.data.processed_urls.len(),
            self.data.pending_urls.len()
        );
        Ok(true)
    }

    /// Lenient [`Checkpoint::try_load`]: missing or corrupt files yield `false`
    pub fn load(&mut self) -> bool {
        match self.try_load() {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!("Ignoring unreadable checkpoint: {}", e);
                false
            }
        }
    }

    /// Persists the checkpoint atomically
    pub fn save(&mut self) -> StateResult<()> {
        let json = self.to_json()?;
        write_atomic(&self.path, json.as_bytes())?;
        tracing::debug!("Checkpoint saved to {}", self.path.display());
        Ok(())
    }

    /// Refreshes the stored counters and renders the file contents
    ///
    /// Callers sharing the checkpoint behind a lock render under it and write
    /// the result to [`Checkpoint::path`] after releasing it.
    pub fn to_json(&mut self) -> StateResult<String> {
        self.data.stats = self.statistics();
        Ok(serde_json::to_string_pretty(&self.data)?)
    }

    /// Queues newly discovered URLs, in discovery order
    ///
    /// URLs already pending or processed are ignored. Returns how many were added.
    pub fn add_pending<I, S>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for url in urls {
            let key = url_key(url.as_ref());
            if self.data.processed_urls.contains_key(&key) {
                continue;
            }
            if self.data.pending_urls.insert(key) {
                added += 1;
            }
        }
        added
    }

    pub fn is_processed(&self, url: &str) -> bool {
        self.data.processed_urls.contains_key(&url_key(url))
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.data.pending_urls.contains(&url_key(url))
    }

    pub fn status(&self, url: &str) -> Option<UrlStatus> {
        self.entry(url).map(|e| e.status)
    }

    pub fn entry(&self, url: &str) -> Option<&ProcessedEntry> {
        self.data.processed_urls.get(&url_key(url))
    }

    /// Records the outcome of processing a URL
    pub fn mark_processed(&mut self, url: &str, success: bool) -> bool {
        if success {
            self.record(url, UrlStatus::Success, None)
        } else {
            self.record(url, UrlStatus::Failed, Some("processing failed".to_string()))
        }
    }

    /// Records a deliberate skip with its reason
    pub fn mark_skipped(&mut self, url: &str, reason: &str) -> bool {
        self.record(url, UrlStatus::Skipped, Some(reason.to_string()))
    }

    pub fn mark_failed(&mut self, url: &str, reason: &str) -> bool {
        self.record(url, UrlStatus::Failed, Some(reason.to_string()))
    }

    /// Moves a URL from pending to processed
    ///
    /// Success and skip entries are final: recording over them is a no-op and
    /// returns `false`. A failed entry is overwritten in place (re-drive) and
    /// its attempt count grows.
    fn record(&mut self, url: &str, status: UrlStatus, error: Option<String>) -> bool {
        let key = url_key(url);
        self.data.pending_urls.shift_remove(&key);

        let attempts = match self.data.processed_urls.get(&key) {
            Some(existing) if !existing.status.is_redrivable() => {
                tracing::debug!("{} already {}, not re-marking", key, existing.status);
                return false;
            }
            Some(existing) => existing.attempts.saturating_add(1),
            None => 1,
        };

        self.data.processed_urls.insert(
            key,
            ProcessedEntry {
                status,
                timestamp: Utc::now(),
                error,
                attempts,
            },
        );
        true
    }

    /// Counters recomputed from the processed map
    pub fn statistics(&self) -> CheckpointStats {
        let mut stats = CheckpointStats {
            pending: self.data.pending_urls.len(),
            total_discovered: self.data.pending_urls.len() + self.data.processed_urls.len(),
            ..CheckpointStats::default()
        };
        for entry in self.data.processed_urls.values() {
            match entry.status {
                UrlStatus::Success => stats.successful += 1,
                UrlStatus::Failed => stats.failed += 1,
                UrlStatus::Skipped => stats.skipped += 1,
            }
        }
        stats
    }

    /// Pending URLs not yet processed, in discovery order
    pub fn resume_set(&self) -> Vec<String> {
        self.data.pending_urls.iter().cloned().collect()
    }

    /// Processed URLs with the given status, in processing order
    pub fn urls_with_status(&self, status: UrlStatus) -> Vec<String> {
        self.data
            .processed_urls
            .iter()
            .filter(|(_, e)| e.status == status)
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn start_url(&self) -> &str {
        &self.data.start_url
    }

    pub fn max_pages(&self) -> u32 {
        self.data.max_pages
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.data.started_at
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
