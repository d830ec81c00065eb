//! Metric instrument factories for sluice.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"sluice"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for sluice instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("sluice")
}

/// Counter: relayed requests by terminal outcome.
/// Labels: `outcome` ("success" | "duplicate_in_progress" |
/// "capacity_exceeded" | "downstream_exhausted" | "internal_error").
pub fn relay_requests() -> Counter<u64> {
    meter()
        .u64_counter("sluice.relay.requests")
        .with_description("Relayed requests by terminal outcome")
        .build()
}

/// Histogram: attempts per relay (1 = first try succeeded).
/// Labels: `result` ("ok" | "exhausted").
pub fn retry_attempts() -> Histogram<u64> {
    meter()
        .u64_histogram("sluice.retry.attempts")
        .with_description("Downstream attempts per relayed request")
        .build()
}

/// Counter: admission queue operations.
/// Labels: `operation` ("enqueue" | "enqueue_rejected" | "dequeue" | "dequeue_empty").
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("sluice.queue.operations")
        .with_description("Admission queue operations")
        .build()
}

/// Counter: dedup store operations.
/// Labels: `operation` ("mark_completed" | "release" | "sweep_expired").
pub fn dedup_operations() -> Counter<u64> {
    meter()
        .u64_counter("sluice.dedup.operations")
        .with_description("Deduplication store operations")
        .build()
}
