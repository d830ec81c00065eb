//! Retry executor: bounded retries with capped exponential backoff and
//! full jitter, plus a hard per-attempt deadline.
//!
//! Full jitter draws each delay uniformly from `[0, cappedExponential]`,
//! which maximizes temporal spread among independently-failing callers and
//! keeps a recovering downstream from being hit by a synchronized retry
//! storm. The cap bounds the wait for high attempt counts.

use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::downstream::DownstreamError;
use crate::model::{DownstreamResponse, RetryOutcome};

/// Retry behavior for one relay attempt sequence.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `max_retries + 1` total attempts.
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the exponential delay before jitter is applied.
    pub max_delay: Duration,
    /// Hard deadline for a single attempt. An attempt that misses it is
    /// abandoned (the future is dropped, not rolled back) and counts as a
    /// timeout failure.
    pub per_attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            per_attempt_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after attempt `attempt` (0-based):
    /// uniform over `[0, min(max_delay, initial_delay * 2^attempt)]`.
    /// Saturating arithmetic, so high attempt counts stay at the cap.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        let capped = exponential.min(self.max_delay);
        let capped_ms = capped.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=capped_ms))
    }
}

/// Drive `operation` through bounded retries under `policy`.
///
/// Every failure kind, timeout included, is treated as retryable; the
/// executor does not distinguish error taxonomies. Returns after the first
/// success or once `max_retries + 1` attempts have failed.
pub async fn execute<F, Fut>(policy: &RetryPolicy, mut operation: F) -> RetryOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<DownstreamResponse, DownstreamError>>,
{
    let start = Instant::now();

    for attempt in 0..=policy.max_retries {
        let result = match tokio::time::timeout(policy.per_attempt_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(DownstreamError::Timeout {
                after_ms: policy.per_attempt_timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(response) => {
                return RetryOutcome {
                    outcome: Ok(response),
                    attempts: attempt + 1,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                };
            }
            Err(error) if attempt == policy.max_retries => {
                warn!(
                    attempts = attempt + 1,
                    error = %error,
                    "downstream call failed; retries exhausted"
                );
                return RetryOutcome {
                    outcome: Err(error),
                    attempts: attempt + 1,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                };
            }
            Err(error) => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    attempt = attempt + 1,
                    backoff_ms = delay.as_millis() as u64,
                    error = %error,
                    "downstream call failed; retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    unreachable!("retry loop returns on success or final failure")
}
