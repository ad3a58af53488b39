//! Tracker task: runs a [`Session`] behind a channel.
//!
//! The tracker owns the session and handles one command at a time, with the
//! debounce deadline awaited in the same `select!`. A timer expiry can never
//! interleave with a capture callback, which is the whole concurrency story:
//! no locks around the queue.
//!
//! Handles never block on capture: commands go through `try_send`, and a full
//! or closed channel is reported to the caller instead of waiting.

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::debug;

use crate::capture::Element;
use crate::error::{Error, Result};
use crate::types::{EventType, Extra};

use super::{Session, TeardownReport};

/// Command buffer size; capture bursts are small
const CHANNEL_BUFFER: usize = 256;

enum TrackerCommand {
    Load(String),
    Click(Box<Element>),
    Track {
        event_type: EventType,
        market_id: Option<String>,
        extra: Extra,
    },
    Flush,
    Teardown(Option<oneshot::Sender<TeardownReport>>),
}

/// Cheap, cloneable handle to a running tracker.
#[derive(Clone)]
pub struct TrackerHandle {
    tx: mpsc::Sender<TrackerCommand>,
}

impl TrackerHandle {
    /// Page finished loading at `location`.
    pub fn load(&self, location: impl Into<String>) -> Result<()> {
        self.send(TrackerCommand::Load(location.into()))
    }

    /// A click landed on `target`.
    pub fn click(&self, target: Element) -> Result<()> {
        self.send(TrackerCommand::Click(Box::new(target)))
    }

    /// Manual capture entry point.
    ///
    /// The event type is validated here so callers learn about an empty tag
    /// immediately.
    pub fn track_event(
        &self,
        event_type: &str,
        market_id: Option<&str>,
        extra: Option<Extra>,
    ) -> Result<()> {
        let event_type = EventType::parse(event_type)?;
        self.send(TrackerCommand::Track {
            event_type,
            market_id: market_id.map(str::to_string),
            extra: extra.unwrap_or_default(),
        })
    }

    /// Flush the queue now through the batch channel.
    pub fn flush(&self) -> Result<()> {
        self.send(TrackerCommand::Flush)
    }

    /// Tear the session down and wait until its deliveries are dispatched.
    pub async fn teardown(&self) -> Result<TeardownReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(TrackerCommand::Teardown(Some(reply_tx)))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        reply_rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// Request teardown without waiting; usable from signal handlers.
    pub fn request_teardown(&self) -> Result<()> {
        self.send(TrackerCommand::Teardown(None))
    }

    /// Resolves once the tracker has exited.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, command: TrackerCommand) -> Result<()> {
        self.tx.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => Error::ChannelClosed,
        })
    }
}

/// Owns a session and serializes everything that touches it.
pub struct Tracker {
    session: Session,
    rx: mpsc::Receiver<TrackerCommand>,
}

impl Tracker {
    /// Create a tracker and its handle.
    ///
    /// The tracker must be spawned as a task using `run()`.
    pub fn new(session: Session) -> (Self, TrackerHandle) {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
        (Self { session, rx }, TrackerHandle { tx })
    }

    /// Run until teardown is requested or every handle is dropped.
    ///
    /// Dropping all handles tears the session down as well.
    pub async fn run(self) -> TeardownReport {
        let Tracker { mut session, mut rx } = self;

        debug!("Tracker started");

        loop {
            let deadline = session.next_deadline();

            // An expired deadline flushes before the next command is applied
            tokio::select! {
                biased;

                _ = sleep_until(deadline) => {
                    session.fire_timer();
                }
                cmd = rx.recv() => {
                    match cmd {
                        Some(TrackerCommand::Load(location)) => {
                            session.on_load(&location);
                        }
                        Some(TrackerCommand::Click(target)) => {
                            session.on_click(target.as_ref());
                        }
                        Some(TrackerCommand::Track { event_type, market_id, extra }) => {
                            session.track(event_type, market_id.as_deref(), extra);
                        }
                        Some(TrackerCommand::Flush) => {
                            session.flush();
                        }
                        Some(TrackerCommand::Teardown(reply)) => {
                            let report = session.teardown();
                            if let Some(reply) = reply {
                                let _ = reply.send(report.clone());
                            }
                            debug!("Tracker stopped after teardown");
                            return report;
                        }
                        None => {
                            debug!("All tracker handles dropped, tearing down");
                            return session.teardown();
                        }
                    }
                }
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Spawn a tracker for `session` on the current runtime.
pub fn spawn(session: Session) -> TrackerHandle {
    let (tracker, handle) = Tracker::new(session);
    tokio::spawn(tracker.run());
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackingConfig;
    use crate::identity::{IdentityResolver, KeyStore, MemoryKeyStore, OverrideMarker};
    use crate::transport::{DeliveryMode, MemoryTransport};
    use std::sync::Arc;
    use std::time::Duration;

    fn spawn_tracker() -> (TrackerHandle, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let store: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
        let resolver = IdentityResolver::new(
            store,
            OverrideMarker::new("currents_test_user"),
            "currents_user_key",
        );
        let session = Session::new(&TrackingConfig::default(), resolver, transport.clone());
        (spawn(session), transport)
    }

    fn batch_sizes(deliveries: &[DeliveryMode]) -> Vec<usize> {
        deliveries
            .iter()
            .filter_map(|d| match d {
                DeliveryMode::Batch(batch) => Some(batch.len()),
                DeliveryMode::Beacon(_) => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_fires_after_quiet_period() {
        let (handle, transport) = spawn_tracker();

        handle.track_event("click", Some("m1"), None).unwrap();
        handle.track_event("click", Some("m2"), None).unwrap();

        tokio::time::sleep(Duration::from_millis(2_999)).await;
        assert!(transport.is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(batch_sizes(&transport.take()), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_quiet_gap_flushes_once() {
        let (handle, transport) = spawn_tracker();

        for round in 0..3 {
            handle
                .track_event("click", Some(&format!("m{}", round)), None)
                .unwrap();
            tokio::time::sleep(Duration::from_millis(3_500)).await;
        }

        assert_eq!(batch_sizes(&transport.take()), vec![1, 1, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exact_debounce_gap_flushes_before_next_event() {
        for _ in 0..50 {
            let (handle, transport) = spawn_tracker();

            handle.track_event("click", Some("a"), None).unwrap();
            tokio::time::sleep(Duration::from_millis(3_000)).await;
            handle.track_event("click", Some("b"), None).unwrap();
            tokio::time::sleep(Duration::from_millis(3_500)).await;

            assert_eq!(batch_sizes(&transport.take()), vec![1, 1]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_flush_cancels_timer() {
        let (handle, transport) = spawn_tracker();

        for i in 0..5 {
            handle
                .track_event("click", Some(&format!("m{}", i)), None)
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(batch_sizes(&transport.take()), vec![5]);

        // No trailing debounce flush
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(transport.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_reports_and_stops() {
        let (handle, transport) = spawn_tracker();

        handle.load("/market/m1").unwrap();
        handle.track_event("click", Some("m2"), None).unwrap();
        handle.track_event("click", Some("m3"), None).unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;
        // Debounce already flushed the three events
        assert_eq!(batch_sizes(&transport.take()), vec![3]);

        handle.track_event("click", Some("m4"), None).unwrap();
        let report = handle.teardown().await.unwrap();

        let beacon = report.beacon.unwrap();
        assert_eq!(beacon.event_type, EventType::Dwell30);
        assert_eq!(report.flushed, 1);

        let deliveries = transport.take();
        assert!(matches!(deliveries[0], DeliveryMode::Beacon(_)));
        assert_eq!(batch_sizes(&deliveries), vec![1]);

        handle.closed().await;
        assert!(!handle.is_running());
        assert!(matches!(handle.flush(), Err(Error::ChannelClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handles_tears_down() {
        let transport = Arc::new(MemoryTransport::new());
        let store: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
        let resolver = IdentityResolver::new(
            store,
            OverrideMarker::new("currents_test_user"),
            "currents_user_key",
        );
        let session = Session::new(&TrackingConfig::default(), resolver, transport.clone());
        let (tracker, handle) = Tracker::new(session);
        let task = tokio::spawn(tracker.run());

        handle.track_event("click", Some("m1"), None).unwrap();
        drop(handle);

        let report = task.await.unwrap();
        assert_eq!(report.flushed, 1);
        assert_eq!(batch_sizes(&transport.take()), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_through_handle() {
        let (handle, transport) = spawn_tracker();

        let card = Element::new("div")
            .with_attr("data-market-id", "m42")
            .with_attr("data-position", "2");
        handle.click(Element::new("span").inside(card)).unwrap();
        handle.flush().unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        match &transport.take()[0] {
            DeliveryMode::Batch(batch) => {
                assert_eq!(batch.events[0].market_id.as_deref(), Some("m42"));
                assert_eq!(batch.events[0].extra["position"], 2);
            }
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_event_type_rejected_at_handle() {
        let (handle, _) = spawn_tracker();
        assert!(matches!(
            handle.track_event(" ", None, None),
            Err(Error::InvalidEvent(_))
        ));
    }
}
