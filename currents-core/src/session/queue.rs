//! In-memory event queue
//!
//! Insertion-ordered and unbounded. Drained whole on every flush, never
//! partially.

use std::collections::VecDeque;

use crate::types::EventRecord;

#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<EventRecord>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail, returning the new length.
    pub fn enqueue(&mut self, record: EventRecord) -> usize {
        self.events.push_back(record);
        self.events.len()
    }

    /// Remove and return every queued event in enqueue order.
    pub fn drain(&mut self) -> Vec<EventRecord> {
        self.events.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Queued events, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.events.iter()
    }
}
