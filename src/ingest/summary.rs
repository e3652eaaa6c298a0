use crate::state::{CheckpointStats, UrlStatus};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Skip reason for a page whose canonical name already exists in the store
pub const SKIPPED_EXISTING: &str = "skipped_existing";

/// Skip reason for a page judged not worth ingesting
pub const SKIPPED_LOW_VALUE: &str = "skipped_low_value";

/// Outcome of one job (a crawl run or a failure re-drive)
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub start_url: String,
    /// Pages attempted in this run
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Pages the crawler returned that an earlier run already processed
    pub already_processed: usize,
    /// Skip reason → count
    pub skip_reasons: BTreeMap<String, usize>,
    /// Whole-job counters from the checkpoint after this run
    pub checkpoint: CheckpointStats,
    pub elapsed: Duration,
    pub cancelled: bool,
    /// The crawl service failed; pages received before the failure were kept
    pub crawl_error: Option<String>,
    /// Written when the failure queue is not empty
    pub failure_report: Option<PathBuf>,
}

impl RunSummary {
    /// Pages with an outcome recorded in this run
    pub fn total(&self) -> usize {
        self.successful + self.failed + self.skipped
    }

    /// URLs still pending in the checkpoint
    pub fn remaining(&self) -> usize {
        self.checkpoint.pending
    }

    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.successful as f64 / self.total() as f64 * 100.0
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.crawl_error.is_some()
    }
}

#[derive(Debug, Default)]
struct Counts {
    successful: usize,
    failed: usize,
    skipped: usize,
    already_processed: usize,
    skip_reasons: BTreeMap<String, usize>,
}

/// Per-run counters shared by the workers
#[derive(Debug, Default)]
pub(crate) struct RunCounters {
    counts: Mutex<Counts>,
}

impl RunCounters {
    /// Counts an outcome; returns pages recorded so far in this run
    pub(crate) fn record(&self, status: UrlStatus, reason: Option<&str>) -> usize {
        let mut counts = self.lock();
        match status {
            UrlStatus::Success => counts.successful += 1,
            UrlStatus::Failed => counts.failed += 1,
            UrlStatus::Skipped => {
                counts.skipped += 1;
                let reason = reason.unwrap_or("skipped").to_string();
                *counts.skip_reasons.entry(reason).or_insert(0) += 1;
            }
        }
        counts.successful + counts.failed + counts.skipped
    }

    /// Clears the counts at the start of a run
    pub(crate) fn reset(&self) {
        *self.lock() = Counts::default();
    }

    pub(crate) fn record_already_processed(&self) {
        self.lock().already_processed += 1;
    }

    /// `(successful, failed, skipped)` so far
    pub(crate) fn snapshot(&self) -> (usize, usize, usize) {
        let counts = self.lock();
        (counts.successful, counts.failed, counts.skipped)
    }

    /// Fills the counter fields of `summary`
    pub(crate) fn fill(&self, summary: &mut RunSummary) {
        let counts = self.lock();
        summary.successful = counts.successful;
        summary.failed = counts.failed;
        summary.skipped = counts.skipped;
        summary.already_processed = counts.already_processed;
        summary.skip_reasons = counts.skip_reasons.clone();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Counts> {
        self.counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_fill_summary() {
        let counters = RunCounters::default();
        assert_eq!(counters.record(UrlStatus::Success, None), 1);
        counters.record(UrlStatus::Skipped, Some(SKIPPED_EXISTING));
        counters.record(UrlStatus::Skipped, Some(SKIPPED_EXISTING));
        counters.record(UrlStatus::Skipped, Some(SKIPPED_LOW_VALUE));
        assert_eq!(counters.record(UrlStatus::Failed, Some("HTTP 500")), 5);
        counters.record_already_processed();

        let mut summary = RunSummary::default();
        counters.fill(&mut summary);

        assert_eq!(summary.total(), 5);
        assert_eq!(summary.already_processed, 1);
        assert_eq!(summary.skip_reasons[SKIPPED_EXISTING], 2);
        assert_eq!(summary.skip_reasons[SKIPPED_LOW_VALUE], 1);
        assert!(summary.has_failures());
        assert!((summary.success_rate() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summary() {
        let summary = RunSummary::default();
        assert_eq!(summary.success_rate(), 0.0);
        assert!(!summary.has_failures());
    }
}
