//! Delivery to the collection endpoint
//!
//! Two channels with different guarantees, chosen by the caller:
//!
//! - [`DeliveryMode::Batch`]: normal flush. Best-effort, at-most-once. Failures
//!   are logged and the batch is dropped; nothing is retried or re-queued.
//! - [`DeliveryMode::Beacon`]: teardown. One synthesized departure event,
//!   dispatched without waiting for or observing the response.
//!
//! [`Transport::deliver`] never blocks and never reports failure to the
//! caller, so telemetry problems cannot leak into the host.

mod http;
mod memory;
mod payload;

pub use http::HttpTransport;
pub use memory::MemoryTransport;
pub use payload::{BeaconPayload, EventBatch};

use std::sync::atomic::{AtomicUsize, Ordering};

/// What to deliver, and therefore through which channel.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryMode {
    /// Queued events, sent through the batch channel
    Batch(EventBatch),
    /// Departure event, sent through the beacon channel
    Beacon(BeaconPayload),
}

impl DeliveryMode {
    pub fn channel(&self) -> &'static str {
        match self {
            DeliveryMode::Batch(_) => "batch",
            DeliveryMode::Beacon(_) => "beacon",
        }
    }

    pub fn user_key(&self) -> &str {
        match self {
            DeliveryMode::Batch(batch) => &batch.user_key,
            DeliveryMode::Beacon(beacon) => &beacon.user_key,
        }
    }
}

/// Sink for deliveries. Implementations must return immediately.
pub trait Transport: Send + Sync {
    fn deliver(&self, delivery: DeliveryMode);
}

/// Delivery counters
#[derive(Debug, Default)]
pub struct TransportStats {
    batches_sent: AtomicUsize,
    batch_failures: AtomicUsize,
    events_sent: AtomicUsize,
    beacons_dispatched: AtomicUsize,
}

impl TransportStats {
    pub(crate) fn record_batch_ok(&self, events: usize) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.events_sent.fetch_add(events, Ordering::Relaxed);
    }

    pub(crate) fn record_batch_failure(&self) {
        self.batch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_beacon(&self) {
        self.beacons_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> DeliveryStats {
        DeliveryStats {
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batch_failures: self.batch_failures.load(Ordering::Relaxed),
            events_sent: self.events_sent.load(Ordering::Relaxed),
            beacons_dispatched: self.beacons_dispatched.load(Ordering::Relaxed),
        }
    }
}

/// Delivery statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Batches acknowledged with a 2xx status
    pub batches_sent: usize,
    /// Batches lost to a transport error or non-2xx status
    pub batch_failures: usize,
    /// Events inside acknowledged batches
    pub events_sent: usize,
    /// Beacons handed to the network (outcome unknown)
    pub beacons_dispatched: usize,
}
