use super::{CircuitBreaker, EndpointClass, RemoteError, RetryPolicy};
use crate::config::ResilienceConfig;
use crate::events::{EventSink, IngestEvent};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Wraps remote calls with retry-with-backoff and per-endpoint circuit breaking
///
/// One breaker exists per [`EndpointClass`]; all workers share them, so a
/// failing document API stops every worker from hammering it while metadata
/// calls keep flowing.
pub struct ResilientClient {
    policy: RetryPolicy,
    max_attempts: u32,
    breakers: HashMap<EndpointClass, CircuitBreaker>,
    events: Arc<dyn EventSink>,
}

impl ResilientClient {
    pub fn new(config: &ResilienceConfig, events: Arc<dyn EventSink>) -> Self {
        let recovery = Duration::from_secs(config.recovery_timeout_secs);
        let breakers = EndpointClass::ALL
            .iter()
            .map(|&class| {
                (
                    class,
                    CircuitBreaker::new(class, config.failure_threshold, recovery),
                )
            })
            .collect();

        Self {
            policy: RetryPolicy::from_config(config),
            max_attempts: config.max_attempts.max(1),
            breakers,
            events,
        }
    }

    /// The breaker guarding `class`
    pub fn breaker(&self, class: EndpointClass) -> &CircuitBreaker {
        // every class gets a breaker in `new`
        &self.breakers[&class]
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes `op` against `class` with retries
    ///
    /// Each attempt goes through the class's breaker. A circuit-open rejection
    /// returns at once. Retryable failures sleep `next_delay(attempt)` and try
    /// again while attempts remain; anything else is returned as-is.
    pub async fn execute<T, F, Fut>(&self, class: EndpointClass, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let breaker = self.breaker(class);
        let mut attempt: u32 = 0;

        loop {
            match breaker.call(&mut op).await {
                Ok(value) => return Ok(value),
                Err(err @ RemoteError::CircuitOpen { .. }) => {
                    self.events
                        .emit(IngestEvent::CircuitRejected { endpoint: class });
                    return Err(err);
                }
                Err(err) => {
                    let attempts_left = attempt + 1 < self.max_attempts;
                    if err.is_retryable() && attempts_left {
                        let delay = self.policy.next_delay(attempt);
                        self.events.emit(IngestEvent::RetryScheduled {
                            endpoint: class,
                            attempt,
                            delay,
                            error: err.to_string(),
                        });
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    self.events.emit(IngestEvent::CallFailed {
                        endpoint: class,
                        attempts: attempt + 1,
                        error: err.to_string(),
                    });
                    return Err(err);
                }
            }
        }
    }
}
