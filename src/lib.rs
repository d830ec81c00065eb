//! # sluice
//!
//! A resilient relay in front of an unreliable downstream dependency.
//!
//! Three cooperating mechanisms protect the relay and the downstream:
//! bounded retries with capped, fully-jittered backoff ([`retry`]), a
//! fixed-capacity admission queue for fail-fast backpressure ([`queue`]),
//! and a TTL-based deduplication store giving at-most-once semantics for
//! externally-retried requests ([`dedup`]). The [`relay`] orchestrator
//! sequences the three per request.

pub mod config;
pub mod dedup;
pub mod downstream;
pub mod error;
pub mod model;
pub mod queue;
pub mod relay;
pub mod retry;
pub mod telemetry;
