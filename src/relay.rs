//! Relay orchestrator: the per-request protocol tying dedup, admission,
//! and retry together.
//!
//! Each incoming request runs as its own task through the same sequence:
//! dedup admission → queue admission → retry-guarded downstream call →
//! outcome recording. The queue and dedup store are explicitly constructed,
//! explicitly owned instances shared across tasks — no ambient globals.

use std::sync::Arc;

use opentelemetry::KeyValue;
use tracing::{Instrument, error, info, warn};

use crate::dedup::{Admission, DedupStore};
use crate::downstream::Downstream;
use crate::model::{RelayOutcome, RelayRequest, WorkItem};
use crate::queue::AdmissionQueue;
use crate::retry::{self, RetryPolicy};
use crate::telemetry::metrics;
use crate::telemetry::relay::start_relay_span;

/// The relay. Owns its policy and holds shared handles to the admission
/// queue, dedup store, and downstream client.
pub struct Relay {
    queue: Arc<AdmissionQueue<WorkItem>>,
    dedup: Arc<DedupStore>,
    policy: RetryPolicy,
    downstream: Arc<dyn Downstream>,
}

impl Relay {
    pub fn new(
        queue: Arc<AdmissionQueue<WorkItem>>,
        dedup: Arc<DedupStore>,
        policy: RetryPolicy,
        downstream: Arc<dyn Downstream>,
    ) -> Self {
        Self {
            queue,
            dedup,
            policy,
            downstream,
        }
    }

    /// Relay one request. Always resolves to exactly one outcome; never
    /// waits indefinitely.
    pub async fn handle(&self, request: RelayRequest) -> RelayOutcome {
        let item = WorkItem::accept(request);
        let span = start_relay_span(&item);
        let outcome = self.run(item).instrument(span).await;
        metrics::relay_requests().add(1, &[KeyValue::new("outcome", outcome.label())]);
        outcome
    }

    async fn run(&self, item: WorkItem) -> RelayOutcome {
        let key = item.correlation_key.clone();

        // 1. Dedup admission. The check-then-set for the key is atomic in
        //    the store, so concurrent duplicates resolve to one Fresh.
        if let Some(ref key) = key {
            match self.dedup.begin(key) {
                Admission::Completed {
                    status_code,
                    result,
                } => {
                    info!(id = %item.id, key, "replaying cached result");
                    return RelayOutcome::Success {
                        status_code,
                        result,
                        attempts: 0,
                        elapsed_ms: 0,
                    };
                }
                Admission::InProgress => {
                    info!(id = %item.id, key, "duplicate while in progress");
                    return RelayOutcome::DuplicateInProgress;
                }
                Admission::Fresh => {}
            }
        }

        // 2. Queue admission. On rejection a just-created in-progress
        //    record is left to expire via TTL; reconciling it would mean a
        //    transaction across both structures.
        let id = item.id;
        if !self.queue.enqueue(item) {
            warn!(
                id = %id,
                depth = self.queue.len(),
                "admission queue full, rejecting"
            );
            return RelayOutcome::CapacityExceeded;
        }

        // 3. Claim the item back. Empty here means another consumer took
        //    it — an invariant violation in the single-orchestrator setup.
        let Some(item) = self.queue.dequeue() else {
            error!(id = %id, "queue empty immediately after successful enqueue");
            if let Some(ref key) = key {
                self.dedup.release(key);
            }
            return RelayOutcome::InternalError {
                message: "work item vanished between enqueue and dequeue".to_string(),
            };
        };

        // 4. Drive the downstream call through the retry executor.
        let retry_outcome =
            retry::execute(&self.policy, || self.downstream.call(&item.payload)).await;
        metrics::retry_attempts().record(
            retry_outcome.attempts as u64,
            &[KeyValue::new(
                "result",
                if retry_outcome.succeeded() { "ok" } else { "exhausted" },
            )],
        );

        // 5. Record the outcome. Failures are never cached; the in-progress
        //    marker is released so a same-key retry starts fresh.
        match retry_outcome.outcome {
            Ok(response) => {
                if let Some(ref key) = key {
                    self.dedup
                        .mark_completed(key, response.status_code, response.body.clone());
                }
                info!(
                    id = %item.id,
                    attempts = retry_outcome.attempts,
                    elapsed_ms = retry_outcome.elapsed_ms,
                    "relay completed"
                );
                RelayOutcome::Success {
                    status_code: response.status_code,
                    result: response.body,
                    attempts: retry_outcome.attempts,
                    elapsed_ms: retry_outcome.elapsed_ms,
                }
            }
            Err(last_error) => {
                if let Some(ref key) = key {
                    self.dedup.release(key);
                }
                warn!(
                    id = %item.id,
                    attempts = retry_outcome.attempts,
                    elapsed_ms = retry_outcome.elapsed_ms,
                    error = %last_error,
                    "relay exhausted retries"
                );
                RelayOutcome::DownstreamExhausted {
                    last_error: last_error.to_string(),
                    attempts: retry_outcome.attempts,
                    elapsed_ms: retry_outcome.elapsed_ms,
                }
            }
        }
    }

    /// Queue depth, for external metrics collectors.
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Queue fill level as a percentage.
    pub fn queue_utilization(&self) -> f64 {
        self.queue.utilization()
    }

    /// Number of live dedup records.
    pub fn dedup_size(&self) -> usize {
        self.dedup.len()
    }
}
