//! Bounded retry with cancellable delays.

use reagent_config::AgentSettings;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a failed attempt is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay after an attempt that produced an unusable result.
    pub invalid_delay: Duration,
    /// Delay after an attempt that failed outright.
    pub error_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, invalid_delay: Duration, error_delay: Duration) -> Self {
        Self {
            max_retries,
            invalid_delay,
            error_delay,
        }
    }

    /// No retries and no delays.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self::new(
            settings.max_thought_retries,
            Duration::from_millis(settings.invalid_thought_delay_ms),
            Duration::from_millis(settings.failed_thought_delay_ms),
        )
    }

    /// Total attempts including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt follows attempt `attempt` (zero-based).
    pub fn has_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(1000), Duration::from_millis(2000))
    }
}

/// The wait was interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

/// Sleep for `delay` unless `cancel` fires first.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<(), Interrupted> {
    if cancel.is_cancelled() {
        return Err(Interrupted);
    }
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
