use super::{EndpointClass, RemoteError};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; failures are counted
    Closed,
    /// Calls are rejected until the recovery timeout elapses
    Open,
    /// One trial call is in flight; its outcome closes or reopens the breaker
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Per-endpoint-class failure tripwire
///
/// After `failure_threshold` consecutive failures the breaker opens and
/// rejects calls with [`RemoteError::CircuitOpen`] without running them. The
/// first call after `recovery_timeout` becomes the single half-open trial;
/// other callers keep being rejected until it finishes.
#[derive(Debug)]
pub struct CircuitBreaker {
    endpoint: EndpointClass,
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

/// Releases a half-open trial as a failure if its future is dropped early
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.record_failure(true);
        }
    }
}

impl CircuitBreaker {
    pub fn new(endpoint: EndpointClass, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            endpoint,
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn endpoint(&self) -> EndpointClass {
        self.endpoint
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Runs `f` through the breaker
    ///
    /// # Returns
    ///
    /// * `Err(RemoteError::CircuitOpen)` - rejected; `f` was not invoked
    /// * otherwise the result of `f`, after recording it
    pub async fn call<T, F, Fut>(&self, f: F) -> Result<T, RemoteError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let trial = self.acquire()?;
        let mut guard = TrialGuard {
            breaker: self,
            armed: trial,
        };

        let result = f().await;
        guard.armed = false;

        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(trial),
        }
        result
    }

    /// Decides whether a call may proceed; `Ok(true)` marks the half-open trial
    fn acquire(&self) -> Result<bool, RemoteError> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(false),
            CircuitState::HalfOpen => Err(self.rejection()),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.recovery_timeout)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    tracing::debug!("Circuit for {} half-open, allowing trial call", self.endpoint);
                    Ok(true)
                } else {
                    Err(self.rejection())
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!("Circuit for {} closed", self.endpoint);
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    fn record_failure(&self, trial: bool) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        let should_open = trial
            || inner.state == CircuitState::HalfOpen
            || inner.consecutive_failures >= self.failure_threshold;

        if should_open {
            if inner.state != CircuitState::Open {
                tracing::warn!(
                    "Circuit for {} opened after {} consecutive failure(s)",
                    self.endpoint,
                    inner.consecutive_failures
                );
            }
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    fn rejection(&self) -> RemoteError {
        RemoteError::CircuitOpen {
            endpoint: self.endpoint,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
