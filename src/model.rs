//! Core data model.
//!
//! A relay request is a payload plus an optional correlation key. Once
//! admitted it becomes a [`WorkItem`] with identity and an acceptance
//! timestamp; the item is dropped as soon as a [`RelayOutcome`] is produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Relay Request
// ---------------------------------------------------------------------------

/// An inbound unit of work, as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    /// Opaque payload forwarded to the downstream. The relay doesn't
    /// interpret it.
    pub payload: serde_json::Value,

    /// Client-supplied correlation key. Requests with the same key are
    /// recognized as duplicates. None disables deduplication entirely.
    pub correlation_key: Option<String>,
}

impl RelayRequest {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            correlation_key: None,
        }
    }

    pub fn correlation_key(mut self, key: impl Into<String>) -> Self {
        self.correlation_key = Some(key.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// An admitted unit of work. Owned by the admission queue while queued,
/// then by the in-flight processing path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique identifier, used for log correlation.
    pub id: RelayId,

    /// Opaque payload forwarded to the downstream.
    pub payload: serde_json::Value,

    /// Correlation key carried through from the request.
    pub correlation_key: Option<String>,

    /// When the relay accepted this item.
    pub accepted_at: DateTime<Utc>,
}

impl WorkItem {
    /// Accept a request into the relay.
    pub fn accept(request: RelayRequest) -> Self {
        Self {
            id: RelayId::new(),
            payload: request.payload,
            correlation_key: request.correlation_key,
            accepted_at: Utc::now(),
        }
    }
}

/// Newtype for relay item IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelayId(pub Uuid);

impl RelayId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RelayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for RelayId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Downstream Response
// ---------------------------------------------------------------------------

/// A successful downstream reply. The status code and body are what the
/// dedup store caches for completed keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownstreamResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Retry Outcome
// ---------------------------------------------------------------------------

/// Result of driving one operation through the retry executor.
#[derive(Debug)]
pub struct RetryOutcome {
    /// Terminal result: the downstream's reply, or the last failure after
    /// retries were exhausted.
    pub outcome: std::result::Result<DownstreamResponse, crate::downstream::DownstreamError>,

    /// Total attempts performed (1-based; success on the first try is 1).
    pub attempts: u32,

    /// Wall time across all attempts and backoff delays.
    pub elapsed_ms: u64,
}

impl RetryOutcome {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

// ---------------------------------------------------------------------------
// Relay Outcome
// ---------------------------------------------------------------------------

/// What the relay tells its caller. A transport layer maps these onto
/// protocol status signals (2xx / 409 / 429 / 502 / 500 equivalents).
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// The downstream answered, or the dedup store replayed a cached answer
    /// (`attempts == 0` in the replay case).
    Success {
        status_code: u16,
        result: serde_json::Value,
        attempts: u32,
        elapsed_ms: u64,
    },
    /// A request with the same correlation key is still being processed.
    DuplicateInProgress,
    /// The admission queue is full; the caller owns the retry decision.
    CapacityExceeded,
    /// Retries exhausted against the downstream.
    DownstreamExhausted {
        last_error: String,
        attempts: u32,
        elapsed_ms: u64,
    },
    /// An invariant violation inside the relay. Never silently swallowed.
    InternalError { message: String },
}

impl RelayOutcome {
    /// Label used on outcome metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            RelayOutcome::Success { .. } => "success",
            RelayOutcome::DuplicateInProgress => "duplicate_in_progress",
            RelayOutcome::CapacityExceeded => "capacity_exceeded",
            RelayOutcome::DownstreamExhausted { .. } => "downstream_exhausted",
            RelayOutcome::InternalError { .. } => "internal_error",
        }
    }
}
