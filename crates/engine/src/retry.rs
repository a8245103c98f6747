//! Bounded retry with exponential backoff and jitter.
//!
//! [`with_retry`] wraps an arbitrary asynchronous operation and re-attempts
//! it while failures classify as transient under the supplied
//! [`RetryConfig`]. Sleeps go through `tokio::time`, so tests run with a
//! paused clock and never wait on the wall.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use courier_providers::ProviderError;
use courier_types::RetryConfig;

/// Outcome of a retried operation, including telemetry about the attempts
/// actually made and the total time spent sleeping between them.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Final result: the first success, or the last failure.
    pub result: Result<T, ProviderError>,
    /// Attempts made, counting the first one.
    pub attempts: u32,
    /// Sum of all backoff sleeps actually incurred.
    pub total_delay: Duration,
}

impl<T> RetryOutcome<T> {
    /// True when the operation eventually succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Executes `operation` up to `1 + config.max_retries` times.
///
/// A failure is retried only while attempts remain and it classifies as
/// transient: an HTTP-status failure must have its code in
/// `retryable_statuses`, any other failure must match one of
/// `retryable_error_patterns` as a case-insensitive substring.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, mut operation: F) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempts = 0u32;
    let mut total_delay = Duration::ZERO;

    loop {
        attempts += 1;
        match operation().await {
            Ok(data) => {
                debug!(attempts, "operation succeeded");
                return RetryOutcome {
                    result: Ok(data),
                    attempts,
                    total_delay,
                };
            }
            Err(error) => {
                let attempts_remain = attempts <= config.max_retries;
                if !attempts_remain || !is_retryable(&error, config) {
                    warn!(attempts, error = %error, "operation failed terminally");
                    return RetryOutcome {
                        result: Err(error),
                        attempts,
                        total_delay,
                    };
                }

                let delay = delay_for_attempt(config, attempts - 1);
                warn!(attempts, delay_ms = delay.as_millis() as u64, error = %error, "transient failure, backing off");
                total_delay += delay;
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn is_retryable(error: &ProviderError, config: &RetryConfig) -> bool {
    if let Some(status) = error.status {
        return config.retryable_statuses.contains(&status);
    }

    let message = error.message.to_lowercase();
    config
        .retryable_error_patterns
        .iter()
        .any(|pattern| message.contains(&pattern.to_lowercase()))
}

/// Delay before the retry following attempt `attempt_index` (0-indexed):
/// `min(base * multiplier^n, max)`, optionally scaled by a uniform factor in
/// `[0.5, 1.0]`.
fn delay_for_attempt(config: &RetryConfig, attempt_index: u32) -> Duration {
    let exponential = config.base_delay_ms as f64 * config.backoff_multiplier.powi(attempt_index as i32);
    let capped = exponential.min(config.max_delay_ms as f64);
    let scaled = if config.jitter {
        capped * rand::rng().random_range(0.5..=1.0)
    } else {
        capped
    };
    Duration::from_millis(scaled.round() as u64)
}
