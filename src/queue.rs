//! Admission queue: a fixed-capacity, non-blocking FIFO.
//!
//! This is a pure admission-control primitive, not a scheduler. It gives
//! the caller a same-call-stack accept/reject signal so excess work can be
//! refused at the boundary with bounded memory. There is deliberately no
//! blocking-wait variant and no consumer coordination.
//!
//! Known limitation: without a throughput-limiting consumer (e.g. a fixed
//! worker pool that is the sole reader), enqueue followed by an immediate
//! dequeue degenerates to a capacity check with no real queueing delay.
//! That consumer is an extension, not part of this component.

use std::collections::VecDeque;
use std::sync::Mutex;

use opentelemetry::KeyValue;

use crate::error::{Error, Result};
use crate::telemetry::metrics;

/// Bounded FIFO over an arbitrary element type. All operations are
/// internally synchronized and return immediately.
pub struct AdmissionQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> AdmissionQueue<T> {
    /// Construct with a fixed capacity. Zero capacity is a configuration
    /// error, fatal at construction time.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config(
                "admission queue capacity must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        })
    }

    /// Append to the tail if there is room. Returns whether the item was
    /// accepted. Never blocks, never overwrites.
    pub fn enqueue(&self, item: T) -> bool {
        let mut items = self.items.lock().expect("admission queue lock poisoned");
        let accepted = items.len() < self.capacity;
        if accepted {
            items.push_back(item);
        }
        metrics::queue_operations().add(
            1,
            &[KeyValue::new(
                "operation",
                if accepted { "enqueue" } else { "enqueue_rejected" },
            )],
        );
        accepted
    }

    /// Remove and return the head, FIFO order. Never blocks.
    pub fn dequeue(&self) -> Option<T> {
        let mut items = self.items.lock().expect("admission queue lock poisoned");
        let item = items.pop_front();
        metrics::queue_operations().add(
            1,
            &[KeyValue::new(
                "operation",
                if item.is_some() {
                    "dequeue"
                } else {
                    "dequeue_empty"
                },
            )],
        );
        item
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("admission queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fill level as a percentage, for external metrics collectors.
    pub fn utilization(&self) -> f64 {
        (self.len() as f64 / self.capacity as f64) * 100.0
    }
}
