use crate::config::ResilienceConfig;
use std::time::Duration;

/// Exponential backoff schedule
///
/// `next_delay(attempt) = min(max_delay, initial_delay * exponential_base^attempt)`
/// where attempt 0 is the first retry.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub exponential_base: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, exponential_base: f64, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            exponential_base,
            max_delay,
        }
    }

    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_delay_ms),
            config.exponential_base,
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Delay to wait before retry number `attempt` (0-based)
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.initial_delay.as_millis() as f64 * self.exponential_base.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ResilienceConfig::default())
    }
}
