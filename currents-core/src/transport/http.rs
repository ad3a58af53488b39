//! HTTP transport for the collection endpoint
//!
//! Each delivery runs in its own spawned task so `deliver` returns
//! immediately. No request timeout is applied and nothing is retried.

use std::sync::{Arc, Mutex};

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tokio::task::JoinHandle;

use crate::config::TrackingConfig;
use crate::error::{Error, Result};

use super::{BeaconPayload, DeliveryMode, DeliveryStats, EventBatch, Transport, TransportStats};

/// Header carrying the user key alongside the batch body
pub const USER_KEY_HEADER: &str = "X-User-Key";

/// HTTP client for the batch and beacon endpoints
pub struct HttpTransport {
    http_client: reqwest::Client,
    batch_url: String,
    beacon_url: String,
    stats: Arc<TransportStats>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl HttpTransport {
    /// Create a transport from configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &TrackingConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            batch_url: config.batch_url(),
            beacon_url: config.beacon_url(),
            stats: Arc::new(TransportStats::default()),
            in_flight: Mutex::new(Vec::new()),
        })
    }

    pub fn batch_url(&self) -> &str {
        &self.batch_url
    }

    pub fn beacon_url(&self) -> &str {
        &self.beacon_url
    }

    /// Get current delivery statistics
    pub fn stats(&self) -> DeliveryStats {
        self.stats.snapshot()
    }

    /// Number of sends still running
    pub fn in_flight(&self) -> usize {
        let mut in_flight = self.lock_in_flight();
        in_flight.retain(|handle| !handle.is_finished());
        in_flight.len()
    }

    /// Wait until every dispatched send has been attempted.
    ///
    /// Hosts call this before exiting so the departure beacon is not lost
    /// with the process.
    pub async fn settle(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.lock_in_flight());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::debug!(error = %e, "Delivery task did not complete");
            }
        }
    }

    fn dispatch_batch(&self, batch: EventBatch) {
        let client = self.http_client.clone();
        let url = self.batch_url.clone();
        let stats = Arc::clone(&self.stats);

        self.spawn(async move {
            let count = batch.len();
            match post_batch(&client, &url, &batch).await {
                Ok(()) => {
                    stats.record_batch_ok(count);
                    tracing::debug!(events = count, "Batch sent successfully");
                }
                Err(e) => {
                    stats.record_batch_failure();
                    tracing::error!(events = count, error = %e, "Batch delivery failed, dropping");
                }
            }
        });
    }

    fn dispatch_beacon(&self, beacon: BeaconPayload) {
        let client = self.http_client.clone();
        let url = self.beacon_url.clone();
        self.stats.record_beacon();

        self.spawn(async move {
            // Outcome intentionally unobserved
            let _ = client.post(&url).json(&beacon).send().await;
        });
    }

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::error!("No async runtime available, delivery dropped");
                return;
            }
        };

        let handle = runtime.spawn(task);
        let mut in_flight = self.lock_in_flight();
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for HttpTransport {
    fn deliver(&self, delivery: DeliveryMode) {
        match delivery {
            DeliveryMode::Batch(batch) => self.dispatch_batch(batch),
            DeliveryMode::Beacon(beacon) => self.dispatch_beacon(beacon),
        }
    }
}

/// POST a batch; any 2xx is success
async fn post_batch(client: &reqwest::Client, url: &str, batch: &EventBatch) -> Result<()> {
    let response = client
        .post(url)
        .header(USER_KEY_HEADER, batch.user_key.as_str())
        .json(batch)
        .send()
        .await
        .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

    let status = response.status();

    if status.is_success() {
        Ok(())
    } else {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        Err(Error::Transport(format!(
            "API error ({}): {}",
            status, error_text
        )))
    }
}
