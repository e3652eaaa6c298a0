use super::{read_optional, url_key, write_atomic, StateError, StateResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A URL that failed every attempt
///
/// `url` is the address as first crawled, so a re-drive fetches exactly what
/// failed; lookups compare normalized forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub url: String,
    pub reason: String,
    pub first_seen_at: DateTime<Utc>,
    /// Number of failures after the first; only ever grows
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_retry_at: Option<DateTime<Utc>>,
}

/// Durable list of permanently failed URLs, kept across runs
///
/// Records are upserted by normalized URL and removed only when the URL is
/// later resolved.
/// With auto-save on, every mutation is written to disk immediately.
#[derive(Debug)]
pub struct FailureQueue {
    path: PathBuf,
    records: Vec<FailureRecord>,
    auto_save: bool,
}

impl FailureQueue {
    /// Creates an empty queue backed by `path`; nothing is read yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
            auto_save: true,
        }
    }

    /// Opens the queue at `path`, loading existing records
    ///
    /// A missing file gives an empty queue; an undecodable one is an error.
    pub fn open(path: impl Into<PathBuf>) -> StateResult<Self> {
        let mut queue = Self::new(path);
        queue.load()?;
        Ok(queue)
    }

    pub fn set_auto_save(&mut self, auto_save: bool) {
        self.auto_save = auto_save;
    }

    /// Replaces in-memory records with the file's contents
    pub fn load(&mut self) -> StateResult<bool> {
        let Some(content) = read_optional(&self.path)? else {
            self.records.clear();
            return Ok(false);
        };

        self.records =
            serde_json::from_str(&content).map_err(|e| StateError::CorruptFailureQueue {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(true)
    }

    pub fn save(&self) -> StateResult<()> {
        let json = serde_json::to_string_pretty(&self.records)?;
        write_atomic(&self.path, json.as_bytes())
    }

    /// Records a failure, or bumps the retry count of an existing record
    ///
    /// An existing record keeps the URL it was first stored under.
    pub fn add(&mut self, url: &str, reason: &str) -> StateResult<()> {
        let now = Utc::now();
        let key = url_key(url);
        match self.records.iter_mut().find(|r| url_key(&r.url) == key) {
            Some(record) => {
                record.retry_count = record.retry_count.saturating_add(1);
                record.reason = reason.to_string();
                record.last_retry_at = Some(now);
            }
            None => self.records.push(FailureRecord {
                url: url.to_string(),
                reason: reason.to_string(),
                first_seen_at: now,
                retry_count: 0,
                last_retry_at: None,
            }),
        }
        self.persist()
    }

    /// Drops the record for a URL that has since been resolved
    ///
    /// Returns whether a record was removed.
    pub fn remove(&mut self, url: &str) -> StateResult<bool> {
        let key = url_key(url);
        let before = self.records.len();
        self.records.retain(|r| url_key(&r.url) != key);
        let removed = self.records.len() != before;
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Records that may still be retried (`retry_count < max_retries`)
    pub fn get_retryable(&self, max_retries: u32) -> Vec<FailureRecord> {
        self.records
            .iter()
            .filter(|r| r.retry_count < max_retries)
            .cloned()
            .collect()
    }

    /// Writes every record as a JSON array to `path`
    pub fn export_report(&self, path: &Path) -> StateResult<()> {
        let json = serde_json::to_string_pretty(&self.records)?;
        write_atomic(path, json.as_bytes())?;
        tracing::info!(
            "Exported {} failed URL(s) to {}",
            self.records.len(),
            path.display()
        );
        Ok(())
    }

    pub fn get(&self, url: &str) -> Option<&FailureRecord> {
        let key = url_key(url);
        self.records.iter().find(|r| url_key(&r.url) == key)
    }

    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> StateResult<()> {
        if self.auto_save {
            self.save()?;
        }
        Ok(())
    }
}
