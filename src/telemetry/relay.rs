//! Relay execution span helpers.
//!
//! One span wraps each request's trip through the orchestrator, carrying
//! the relay id and whether deduplication is active for it.

use tracing::Span;

use crate::model::WorkItem;

/// Start a span for one relayed request.
pub fn start_relay_span(item: &WorkItem) -> Span {
    tracing::info_span!(
        "relay.handle",
        "relay.id" = %item.id,
        "relay.deduplicated" = item.correlation_key.is_some(),
    )
}
