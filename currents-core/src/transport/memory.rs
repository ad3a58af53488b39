//! Transport that keeps deliveries in memory instead of sending them.
//!
//! Used for dry runs and by tests that assert on outbound effects.

use std::sync::Mutex;

use super::{DeliveryMode, Transport};

#[derive(Debug, Default)]
pub struct MemoryTransport {
    deliveries: Mutex<Vec<DeliveryMode>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries so far, oldest first
    pub fn deliveries(&self) -> Vec<DeliveryMode> {
        self.lock().clone()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<DeliveryMode> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DeliveryMode>> {
        self.deliveries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for MemoryTransport {
    fn deliver(&self, delivery: DeliveryMode) {
        tracing::trace!(channel = delivery.channel(), "Recorded delivery");
        self.lock().push(delivery);
    }
}
