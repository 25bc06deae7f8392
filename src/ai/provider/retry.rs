//! Bounded retry for backend calls
//!
//! Delays come from backon's exponential builder; the driver below decides
//! per attempt whether to stop, so the caller can mark timeouts and
//! rate limits as transient and everything else as terminal.

use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::constants::retry as retry_constants;
use crate::types::{ForgeError, Result};

/// Result of one attempt as seen by the retry driver
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Success(T),
    /// Worth another attempt while budget remains
    Transient(ForgeError),
    /// Stop immediately
    Terminal(ForgeError),
}

impl<T> AttemptOutcome<T> {
    /// Sort a plain result by `ForgeError::is_transient`
    pub fn classify(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) if err.is_transient() => Self::Transient(err),
            Err(err) => Self::Terminal(err),
        }
    }
}

/// Exponential backoff within `[min_delay, max_delay]`, stopping after
/// `max_attempts` attempts (first try included)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f32,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry_constants::MAX_ATTEMPTS,
            min_delay_ms: retry_constants::MIN_DELAY_MS,
            max_delay_ms: retry_constants::MAX_DELAY_MS,
            factor: retry_constants::BACKOFF_FACTOR,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits, for tests
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            min_delay_ms: 0,
            max_delay_ms: 0,
            factor: 1.0,
            jitter: false,
        }
    }

    fn delays(&self) -> impl Iterator<Item = Duration> {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.min_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_factor(self.factor)
            .with_max_times(self.max_attempts.saturating_sub(1));
        if self.jitter {
            builder = builder.with_jitter();
        }
        // backon jitters after clamping, so clamp again
        let max = self.max_delay();
        builder.build().map(move |delay| delay.min(max))
    }

    fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Wait before the next attempt: the scheduled delay, raised to the
    /// backend's `Retry-After` hint, never above `max_delay_ms`
    fn next_delay(&self, scheduled: Duration, err: &ForgeError) -> Duration {
        err.retry_after()
            .map_or(scheduled, |hint| scheduled.max(hint))
            .min(self.max_delay())
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err("retry.min_delay_ms must not exceed retry.max_delay_ms".to_string());
        }
        if self.factor < 1.0 {
            return Err("retry.factor must be at least 1.0".to_string());
        }
        Ok(())
    }
}

/// Run `attempt` until it succeeds, fails terminally, or the budget runs out.
///
/// `attempt` receives the 1-based attempt number. The last transient error
/// is returned when the budget is exhausted.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = AttemptOutcome<T>>,
{
    let mut delays = policy.delays();
    let mut number = 1;

    loop {
        match attempt(number).await {
            AttemptOutcome::Success(value) => {
                if number > 1 {
                    debug!(operation, attempts = number, "Succeeded after retry");
                }
                return Ok(value);
            }
            AttemptOutcome::Terminal(err) => return Err(err),
            AttemptOutcome::Transient(err) => match delays.next() {
                Some(scheduled) => {
                    let delay = policy.next_delay(scheduled, &err);
                    warn!(
                        operation,
                        attempt = number,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    sleep(delay).await;
                    number += 1;
                }
                None => {
                    warn!(operation, attempts = number, error = %err, "Retry budget exhausted");
                    return Err(err);
                }
            },
        }
    }
}
