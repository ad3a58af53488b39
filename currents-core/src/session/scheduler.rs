//! Batch scheduling
//!
//! Decides when the queue is flushed: immediately once it reaches the size
//! threshold, otherwise after a quiet period (debounce). There is at most one
//! pending flush; arming a new one replaces the previous deadline.

use std::time::Duration;

use tokio::time::Instant;

/// Outcome of an enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// Threshold reached, flush now
    FlushNow,
    /// Below threshold, flush at the given deadline unless reset
    Armed(Instant),
}

/// A single deferred flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFlush {
    pub deadline: Instant,
}

#[derive(Debug)]
pub struct BatchScheduler {
    batch_size: usize,
    debounce: Duration,
    pending: Option<PendingFlush>,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, debounce: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            debounce,
            pending: None,
        }
    }

    /// React to an enqueue that left the queue at `queue_len`.
    ///
    /// At threshold the pending flush is cancelled; below it the debounce
    /// deadline restarts from `now`.
    pub fn on_enqueue(&mut self, queue_len: usize, now: Instant) -> ScheduleDecision {
        if queue_len >= self.batch_size {
            self.cancel();
            return ScheduleDecision::FlushNow;
        }

        let deadline = now + self.debounce;
        self.pending = Some(PendingFlush { deadline });
        ScheduleDecision::Armed(deadline)
    }

    /// True when a pending flush exists and its deadline has passed.
    pub fn is_due(&self, now: Instant) -> bool {
        self.pending.is_some_and(|p| p.deadline <= now)
    }

    /// Consume the pending flush if due.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Drop the pending flush, if any.
    pub fn cancel(&mut self) -> Option<PendingFlush> {
        self.pending.take()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.deadline)
    }

    pub fn pending(&self) -> Option<PendingFlush> {
        self.pending
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }
}
