//! Deduplication store: correlation key → request lifecycle record.
//!
//! Each record moves `absent → in-progress → completed → absent` (after
//! TTL), never backwards. The TTL is anchored at first sight, not at
//! completion: a client that lost the first response can retry much later
//! and still hit the cache, while memory stays bounded regardless of how
//! long processing took.
//!
//! Expired records are removed lazily on lookup; [`DedupStore::sweep`]
//! (usually run by the task from [`DedupStore::spawn_sweeper`]) bounds
//! memory for keys that are never looked up again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::telemetry::metrics;

/// Lifecycle status of a deduplicated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupStatus {
    InProgress,
    Completed,
}

/// Per-key record. `first_seen` is set once at creation and never updated;
/// expiry is always measured from it. Only successful outcomes carry cached
/// fields.
#[derive(Debug, Clone)]
pub struct DedupRecord {
    pub status: DedupStatus,
    pub first_seen: Instant,
    pub status_code: Option<u16>,
    pub result: Option<serde_json::Value>,
}

impl DedupRecord {
    fn in_progress() -> Self {
        Self {
            status: DedupStatus::InProgress,
            first_seen: Instant::now(),
            status_code: None,
            result: None,
        }
    }

    fn expired(&self, ttl: Duration) -> bool {
        self.first_seen.elapsed() > ttl
    }
}

/// Decision for an arriving correlation key, made atomically per key.
#[derive(Debug, Clone)]
pub enum Admission {
    /// Key unseen (or expired). A fresh in-progress record now exists.
    Fresh,
    /// An unexpired record is still in-progress: a conflict, distinct from
    /// both "new" and "already completed".
    InProgress,
    /// The key completed within the TTL window; replay the cached outcome.
    Completed {
        status_code: u16,
        result: serde_json::Value,
    },
}

/// In-process dedup store shared by every concurrent relay task. All
/// operations are synchronous, non-blocking, and internally synchronized.
pub struct DedupStore {
    records: Mutex<HashMap<String, DedupRecord>>,
    ttl: Duration,
    shutdown: Notify,
}

impl DedupStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            ttl,
            shutdown: Notify::new(),
        }
    }

    /// Return the record for `key`, unless absent or expired. An expired
    /// record is physically removed as a side effect.
    pub fn lookup(&self, key: &str) -> Option<DedupRecord> {
        let mut records = self.records.lock().expect("dedup store lock poisoned");
        match records.get(key).map(|record| record.expired(self.ttl)) {
            Some(true) => {
                records.remove(key);
                None
            }
            Some(false) => records.get(key).cloned(),
            None => None,
        }
    }

    /// Unconditionally (re)create an in-progress record with a fresh TTL
    /// window. Intended only after `lookup` found no unexpired record;
    /// callers that need the check-then-set to be atomic use [`Self::begin`].
    pub fn mark_in_progress(&self, key: &str) {
        let mut records = self.records.lock().expect("dedup store lock poisoned");
        records.insert(key.to_string(), DedupRecord::in_progress());
    }

    /// Atomic check-then-set for one key: look up and, if absent or
    /// expired, create the in-progress record under the same lock hold.
    /// This is the single-writer-per-key guarantee — two near-simultaneous
    /// calls with the same fresh key yield exactly one `Fresh`.
    pub fn begin(&self, key: &str) -> Admission {
        let mut records = self.records.lock().expect("dedup store lock poisoned");
        if let Some(record) = records.get(key) {
            if !record.expired(self.ttl) {
                match record.status {
                    DedupStatus::InProgress => return Admission::InProgress,
                    DedupStatus::Completed => {
                        return Admission::Completed {
                            status_code: record.status_code.unwrap_or(200),
                            result: record.result.clone().unwrap_or(serde_json::Value::Null),
                        };
                    }
                }
            }
        }
        records.insert(key.to_string(), DedupRecord::in_progress());
        Admission::Fresh
    }

    /// Record a successful outcome. Updates in place preserving
    /// `first_seen`; creates a record (fresh window) on the defensive path
    /// where none exists. A completed record never reverts to in-progress.
    pub fn mark_completed(&self, key: &str, status_code: u16, result: serde_json::Value) {
        let mut records = self.records.lock().expect("dedup store lock poisoned");
        let record = records
            .entry(key.to_string())
            .or_insert_with(DedupRecord::in_progress);
        record.status = DedupStatus::Completed;
        record.status_code = Some(status_code);
        record.result = Some(result);
        metrics::dedup_operations().add(1, &[KeyValue::new("operation", "mark_completed")]);
    }

    /// Remove the record for `key` only while it is still in-progress.
    ///
    /// Contract for failed relays: failures are never cached, and the
    /// in-progress marker is cleared so a same-key retry is treated as
    /// fresh rather than seeing a stale conflict for the rest of the TTL
    /// window. A completed record is left untouched.
    pub fn release(&self, key: &str) {
        let mut records = self.records.lock().expect("dedup store lock poisoned");
        let in_progress = records
            .get(key)
            .is_some_and(|record| record.status == DedupStatus::InProgress);
        if in_progress {
            records.remove(key);
            metrics::dedup_operations().add(1, &[KeyValue::new("operation", "release")]);
        }
    }

    /// Remove every expired record. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut records = self.records.lock().expect("dedup store lock poisoned");
        let before = records.len();
        records.retain(|_, record| !record.expired(self.ttl));
        let removed = before - records.len();
        if removed > 0 {
            metrics::dedup_operations().add(
                removed as u64,
                &[KeyValue::new("operation", "sweep_expired")],
            );
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("dedup store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .expect("dedup store lock poisoned")
            .clear();
    }

    /// Stop the periodic sweeper, if one is running.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Run `sweep` on a periodic timer until [`Self::shutdown`] is called.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "dedup sweeper started");
            loop {
                tokio::select! {
                    _ = store.shutdown.notified() => {
                        info!("dedup sweeper shutting down");
                        return;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let removed = store.sweep();
                        if removed > 0 {
                            debug!(removed, remaining = store.len(), "dedup sweep");
                        }
                    }
                }
            }
        })
    }
}
