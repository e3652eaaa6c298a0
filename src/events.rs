//! Typed progress events
//!
//! The library never writes to the console. Everything a user might want to
//! see is emitted as an [`IngestEvent`] to an [`EventSink`]; the binary uses
//! [`TracingSink`] and tests use [`RecordingSink`].

use crate::mode::ModeDecision;
use crate::resilience::EndpointClass;
use crate::state::UrlStatus;
use std::sync::Mutex;
use std::time::Duration;

/// Something worth reporting that happened during a job
#[derive(Debug, Clone)]
pub enum IngestEvent {
    Log(String),
    Warning(String),
    Error(String),

    /// Periodic counters, emitted every few processed pages
    Progress {
        processed: usize,
        successful: usize,
        failed: usize,
        skipped: usize,
    },

    /// Final outcome of one page
    PageOutcome {
        url: String,
        status: UrlStatus,
        detail: String,
    },

    /// Which processing mode was chosen for a page and why
    ModeDecision { url: String, decision: ModeDecision },

    /// A remote call failed and will be retried after `delay`
    RetryScheduled {
        endpoint: EndpointClass,
        attempt: u32,
        delay: Duration,
        error: String,
    },

    /// A remote call gave up after `attempts` tries
    CallFailed {
        endpoint: EndpointClass,
        attempts: u32,
        error: String,
    },

    /// A call was rejected without being attempted because the breaker is open
    CircuitRejected { endpoint: EndpointClass },
}

/// Receiver for [`IngestEvent`]s
///
/// Implementations must be cheap and non-blocking; they are called from every
/// worker.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: IngestEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: IngestEvent) {
        match event {
            IngestEvent::Log(message) => tracing::info!("{}", message),
            IngestEvent::Warning(message) => tracing::warn!("{}", message),
            IngestEvent::Error(message) => tracing::error!("{}", message),
            IngestEvent::Progress {
                processed,
                successful,
                failed,
                skipped,
            } => tracing::info!(
                "Progress: {} processed ({} ok, {} failed, {} skipped)",
                processed,
                successful,
                failed,
                skipped
            ),
            IngestEvent::PageOutcome { url, status, detail } => match status {
                UrlStatus::Failed => tracing::warn!("Failed {}: {}", url, detail),
                _ => tracing::info!("{} {}: {}", status.as_str(), url, detail),
            },
            IngestEvent::ModeDecision { url, decision } => tracing::debug!(
                "Mode for {}: {} via {} ({})",
                url,
                decision.outcome_label(),
                decision.branch.as_str(),
                decision.reason
            ),
            IngestEvent::RetryScheduled {
                endpoint,
                attempt,
                delay,
                error,
            } => tracing::warn!(
                "{} attempt {} failed: {}; retrying in {:?}",
                endpoint,
                attempt + 1,
                error,
                delay
            ),
            IngestEvent::CallFailed {
                endpoint,
                attempts,
                error,
            } => tracing::warn!("{} gave up after {} attempt(s): {}", endpoint, attempts, error),
            IngestEvent::CircuitRejected { endpoint } => {
                tracing::warn!("Circuit open for {}, call rejected", endpoint)
            }
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<IngestEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events so far
    pub fn events(&self) -> Vec<IngestEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of recorded events matching `predicate`
    pub fn count<P>(&self, predicate: P) -> usize
    where
        P: Fn(&IngestEvent) -> bool,
    {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|e| predicate(e))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: IngestEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
