//! Retry executor: attempt counting, per-attempt deadline, backoff bounds.
//!
//! Timing-sensitive tests run under a paused tokio clock, so backoff and
//! timeouts auto-advance instead of costing wall time.

use serde_json::json;
use sluice::downstream::DownstreamError;
use sluice::model::DownstreamResponse;
use sluice::retry::{self, RetryPolicy};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(10),
        per_attempt_timeout: Duration::from_secs(5),
    }
}

fn ok_response() -> DownstreamResponse {
    DownstreamResponse {
        status_code: 200,
        body: json!({"ok": true}),
    }
}

// ---------------------------------------------------------------------------
// Attempt counting
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn always_failing_operation_performs_max_retries_plus_one_attempts() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let outcome = retry::execute(&fast_policy(3), || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DownstreamError::Transport("connection refused".to_string()))
        }
    })
    .await;

    assert!(!outcome.succeeded());
    assert_eq!(outcome.attempts, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(
        outcome.outcome.unwrap_err(),
        DownstreamError::Transport("connection refused".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn success_on_kth_attempt_stops_there() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let outcome = retry::execute(&fast_policy(5), || {
        let counter = Arc::clone(&counter);
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(DownstreamError::Status {
                    code: 503,
                    message: "unavailable".to_string(),
                })
            } else {
                Ok(ok_response())
            }
        }
    })
    .await;

    assert!(outcome.succeeded());
    assert_eq!(outcome.attempts, 3);
    // No further attempts after the success.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn zero_retries_means_a_single_attempt() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let outcome = retry::execute(&fast_policy(0), || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DownstreamError::Transport("boom".to_string()))
        }
    })
    .await;

    assert!(!outcome.succeeded());
    assert_eq!(outcome.attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn immediate_success_is_one_attempt() {
    let outcome = retry::execute(&fast_policy(3), || async { Ok(ok_response()) }).await;
    assert!(outcome.succeeded());
    assert_eq!(outcome.attempts, 1);
}

// ---------------------------------------------------------------------------
// Per-attempt deadline
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn hung_operation_counts_as_timeout_failure() {
    let policy = RetryPolicy {
        max_retries: 1,
        per_attempt_timeout: Duration::from_millis(250),
        ..fast_policy(1)
    };

    let outcome = retry::execute(&policy, || async {
        std::future::pending::<Result<DownstreamResponse, DownstreamError>>().await
    })
    .await;

    assert!(!outcome.succeeded());
    assert_eq!(outcome.attempts, 2);
    assert_eq!(
        outcome.outcome.unwrap_err(),
        DownstreamError::Timeout { after_ms: 250 }
    );
}

#[tokio::test(start_paused = true)]
async fn slow_then_fast_operation_recovers_after_timeout() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let policy = RetryPolicy {
        max_retries: 2,
        per_attempt_timeout: Duration::from_millis(100),
        ..fast_policy(2)
    };

    let outcome = retry::execute(&policy, || {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                // First attempt hangs past the deadline.
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(ok_response())
        }
    })
    .await;

    assert!(outcome.succeeded());
    assert_eq!(outcome.attempts, 2);
}

// ---------------------------------------------------------------------------
// Backoff bounds and jitter
// ---------------------------------------------------------------------------

#[test]
fn backoff_delay_stays_within_capped_exponential_bound() {
    let policy = RetryPolicy {
        max_retries: 10,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(10_000),
        per_attempt_timeout: Duration::from_secs(1),
    };

    for attempt in 0..10 {
        let bound = Duration::from_millis(100)
            .saturating_mul(2u32.pow(attempt))
            .min(Duration::from_millis(10_000));
        for _ in 0..200 {
            let delay = policy.backoff_delay(attempt);
            assert!(
                delay <= bound,
                "attempt {attempt}: delay {delay:?} above bound {bound:?}"
            );
        }
    }
}

#[test]
fn backoff_delay_is_jittered_not_constant() {
    let policy = RetryPolicy::default();

    // Same attempt index, many draws: full jitter must produce spread.
    let draws: std::collections::HashSet<u128> = (0..100)
        .map(|_| policy.backoff_delay(4).as_millis())
        .collect();
    assert!(
        draws.len() > 1,
        "100 draws for the same attempt yielded a single delay value"
    );
}

#[test]
fn backoff_delay_saturates_at_high_attempt_counts() {
    let policy = RetryPolicy {
        max_retries: u32::MAX,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(5_000),
        per_attempt_timeout: Duration::from_secs(1),
    };

    // 2^1000 overflows everything; the cap must still hold.
    let delay = policy.backoff_delay(1000);
    assert!(delay <= Duration::from_millis(5_000));
}
