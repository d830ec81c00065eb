//! The downstream seam.
//!
//! The relay only knows the downstream by its contract: a call either
//! produces a [`DownstreamResponse`] or fails with a [`DownstreamError`].
//! Latency and failure distribution are the downstream's business.

use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::model::DownstreamResponse;

/// Why a downstream call failed. Every variant is uniformly retryable from
/// the retry executor's point of view; finer taxonomy is the caller's call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DownstreamError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("downstream returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("attempt exceeded deadline of {after_ms}ms")]
    Timeout { after_ms: u64 },
}

/// An unreliable dependency the relay forwards work to.
#[async_trait]
pub trait Downstream: Send + Sync {
    async fn call(
        &self,
        payload: &serde_json::Value,
    ) -> Result<DownstreamResponse, DownstreamError>;
}

// ---------------------------------------------------------------------------
// Simulated downstream
// ---------------------------------------------------------------------------

/// A downstream with injectable failures, for tests and the CLI demo.
///
/// Two failure modes, combinable:
/// - `fail_first(n)`: the first n calls fail deterministically, the rest
///   succeed.
/// - `failure_rate(p)`: each call beyond the deterministic window fails
///   with probability p.
pub struct SimulatedDownstream {
    fail_first: AtomicU32,
    failure_rate: f64,
    latency: Duration,
    calls: AtomicU64,
}

impl SimulatedDownstream {
    /// A downstream that always succeeds immediately.
    pub fn reliable() -> Self {
        Self {
            fail_first: AtomicU32::new(0),
            failure_rate: 0.0,
            latency: Duration::ZERO,
            calls: AtomicU64::new(0),
        }
    }

    /// Fail the first `n` calls with a transport error, then succeed.
    pub fn fail_first(n: u32) -> Self {
        Self {
            fail_first: AtomicU32::new(n),
            ..Self::reliable()
        }
    }

    /// Fail each call independently with probability `rate` in `[0, 1]`.
    pub fn flaky(rate: f64) -> Self {
        Self {
            failure_rate: rate,
            ..Self::reliable()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Total calls observed, deterministic-failure window included.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Downstream for SimulatedDownstream {
    async fn call(
        &self,
        payload: &serde_json::Value,
    ) -> Result<DownstreamResponse, DownstreamError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        // Consume one deterministic failure if any remain.
        let remaining = self
            .fail_first
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if remaining {
            return Err(DownstreamError::Transport(
                "connection reset by peer".to_string(),
            ));
        }

        if self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate) {
            return Err(DownstreamError::Status {
                code: 503,
                message: "service unavailable".to_string(),
            });
        }

        Ok(DownstreamResponse {
            status_code: 200,
            body: serde_json::json!({ "echo": payload }),
        })
    }
}
