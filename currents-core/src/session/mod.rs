//! Page session: the single owner of all tracking state
//!
//! A [`Session`] is created once per page and lives until teardown. Capture
//! callbacks (`on_load`, `on_click`, `track_event`), timer expiry and teardown
//! all go through `&mut Session` and run to completion, so there is never more
//! than one flush in progress.
//!
//! ```text
//!  on_load / on_click / track_event
//!              │
//!              ▼
//!        ┌───────────┐  len   ┌────────────────┐
//!        │ EventQueue│──────▶ │ BatchScheduler │── FlushNow / deadline
//!        └───────────┘        └────────────────┘
//!              │ drain                │
//!              ▼                      ▼
//!        IdentityResolver ──▶ Transport (Batch | Beacon)
//! ```
//!
//! Time is read from `tokio::time::Instant`, so tests can drive the session
//! with a paused clock.

mod queue;
mod scheduler;
mod tracker;

pub use queue::EventQueue;
pub use scheduler::{BatchScheduler, PendingFlush, ScheduleDecision};
pub use tracker::{spawn, Tracker, TrackerHandle};

use std::sync::Arc;

use tokio::time::Instant;

use crate::capture::{self, DomNode};
use crate::config::TrackingConfig;
use crate::dwell;
use crate::error::Result;
use crate::identity::IdentityResolver;
use crate::transport::{BeaconPayload, DeliveryMode, EventBatch, Transport};
use crate::types::{EventRecord, EventType, Extra};

/// What teardown dispatched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeardownReport {
    /// Departure event, if the page addressed a market
    pub beacon: Option<BeaconPayload>,
    /// Events flushed through the batch channel
    pub flushed: usize,
}

/// Session counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Events accepted into the queue
    pub events_captured: usize,
    /// Batches handed to the transport
    pub batches_dispatched: usize,
}

pub struct Session {
    resolver: IdentityResolver,
    transport: Arc<dyn Transport>,
    queue: EventQueue,
    scheduler: BatchScheduler,
    current_market: Option<String>,
    started_at: Instant,
    stats: SessionStats,
}

impl Session {
    /// Start a session; the dwell timer starts now.
    pub fn new(
        config: &TrackingConfig,
        resolver: IdentityResolver,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            resolver,
            transport,
            queue: EventQueue::new(),
            scheduler: BatchScheduler::new(config.batch_size, config.debounce()),
            current_market: None,
            started_at: Instant::now(),
            stats: SessionStats::default(),
        }
    }

    /// Page finished loading at `location`.
    ///
    /// If the location addresses a market it becomes the session's current
    /// market and a `view_market` event is queued. Returns the market id.
    pub fn on_load(&mut self, location: &str) -> Option<String> {
        let user_key = self.resolver.resolve();
        tracing::info!(
            user = %user_key.display_key(),
            mode = user_key.mode(),
            test_user_marker = self.resolver.marker().is_set(),
            location = %location,
            "Session start"
        );

        let market = capture::market_from_path(location)?.to_string();
        self.current_market = Some(market.clone());
        self.enqueue(EventRecord::new(EventType::ViewMarket, Some(market.clone())));
        Some(market)
    }

    /// A click landed on `target`. Returns true if it hit a market card.
    pub fn on_click<N: DomNode>(&mut self, target: &N) -> bool {
        match capture::click_target(target) {
            Some(click) => {
                self.enqueue(click.into_record());
                true
            }
            None => false,
        }
    }

    /// Manual capture entry point (`trackEvent(eventType, marketId?, extra?)`).
    ///
    /// A missing or empty `market_id` falls back to the current market.
    pub fn track_event(
        &mut self,
        event_type: &str,
        market_id: Option<&str>,
        extra: Option<Extra>,
    ) -> Result<()> {
        let event_type = EventType::parse(event_type)?;
        self.track(event_type, market_id, extra.unwrap_or_default());
        Ok(())
    }

    /// Queue an already validated manual event.
    pub fn track(&mut self, event_type: EventType, market_id: Option<&str>, extra: Extra) {
        let market_id = market_id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| self.current_market.clone());

        self.enqueue(EventRecord::new(event_type, market_id).merge_extra(extra));
    }

    /// Queue a record and let the scheduler decide whether to flush.
    pub fn enqueue(&mut self, record: EventRecord) {
        tracing::debug!(
            event_type = %record.event_type,
            market_id = record.market_id.as_deref().unwrap_or("-"),
            "Event queued"
        );

        let len = self.queue.enqueue(record);
        self.stats.events_captured += 1;

        match self.scheduler.on_enqueue(len, Instant::now()) {
            ScheduleDecision::FlushNow => {
                tracing::debug!(queued = len, "Queue full, sending batch now");
                self.flush();
            }
            ScheduleDecision::Armed(_) => {}
        }
    }

    /// Drain the queue through the batch channel. Returns the events sent.
    ///
    /// Identity is resolved here, at flush time.
    pub fn flush(&mut self) -> usize {
        self.scheduler.cancel();
        if self.queue.is_empty() {
            return 0;
        }

        let user_key = self.resolver.resolve();
        let events = self.queue.drain();
        let count = events.len();

        tracing::info!(
            events = count,
            user = %user_key.display_key(),
            "Sending batch"
        );

        self.stats.batches_dispatched += 1;
        self.transport
            .deliver(DeliveryMode::Batch(EventBatch::new(&user_key, events)));
        count
    }

    /// Flush if the debounce deadline has passed. Returns true if it fired.
    pub fn fire_timer(&mut self) -> bool {
        if self.scheduler.take_due(Instant::now()) {
            self.flush();
            true
        } else {
            false
        }
    }

    /// Deadline of the pending debounced flush
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// Page is going away.
    ///
    /// Sends the dwell event through the beacon channel (when a market is
    /// current), then flushes whatever is still queued through the batch
    /// channel. The pending timer is ignored. Consumes the session.
    pub fn teardown(mut self) -> TeardownReport {
        let beacon = self.current_market.take().map(|market_id| {
            let dwell_ms = dwell::duration_ms(self.started_at.elapsed());
            let event_type = dwell::classify(dwell_ms);
            let user_key = self.resolver.resolve();

            tracing::info!(
                market_id = %market_id,
                event_type = %event_type,
                dwell_ms,
                "Sending departure beacon"
            );

            let payload = BeaconPayload::new(&user_key, market_id, event_type, dwell_ms);
            self.transport.deliver(DeliveryMode::Beacon(payload.clone()));
            payload
        });

        let flushed = self.flush();

        TeardownReport { beacon, flushed }
    }

    pub fn current_market(&self) -> Option<&str> {
        self.current_market.as_deref()
    }

    /// Number of events waiting for the next flush
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Time since the session started
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }
}
