//! Delivery backends selectable from the command line

use std::sync::Arc;

use anyhow::{Context, Result};
use currents_core::config::TrackingConfig;
use currents_core::transport::{DeliveryMode, HttpTransport, MemoryTransport, Transport};

/// Where the session's deliveries go
pub enum Delivery {
    /// POST to the configured endpoint
    Http(Arc<HttpTransport>),
    /// Record deliveries and print them instead of sending
    DryRun(Arc<MemoryTransport>),
}

impl Delivery {
    pub fn new(config: &TrackingConfig, dry_run: bool) -> Result<Self> {
        if dry_run {
            return Ok(Delivery::DryRun(Arc::new(MemoryTransport::new())));
        }

        let transport = HttpTransport::new(config).context("failed to create HTTP transport")?;
        Ok(Delivery::Http(Arc::new(transport)))
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        match self {
            Delivery::Http(transport) => transport.clone(),
            Delivery::DryRun(transport) => transport.clone(),
        }
    }

    /// Wait for outstanding sends, then report what happened.
    pub async fn finish(&self) -> Result<()> {
        match self {
            Delivery::Http(transport) => {
                transport.settle().await;

                let stats = transport.stats();
                println!();
                println!(
                    "Delivered: {} batch(es), {} event(s), {} beacon(s)",
                    stats.batches_sent, stats.events_sent, stats.beacons_dispatched
                );
                if stats.batch_failures > 0 {
                    println!(
                        "Dropped:   {} batch(es) (run with -v and check the log)",
                        stats.batch_failures
                    );
                }
            }
            Delivery::DryRun(transport) => {
                let deliveries = transport.take();
                println!();
                println!("Dry run - {} delivery(ies) not sent:", deliveries.len());
                for delivery in &deliveries {
                    println!("  {} {}", delivery.channel(), render(delivery)?);
                }
            }
        }
        Ok(())
    }
}

fn render(delivery: &DeliveryMode) -> Result<String> {
    let json = match delivery {
        DeliveryMode::Batch(batch) => serde_json::to_string(batch),
        DeliveryMode::Beacon(beacon) => serde_json::to_string(beacon),
    };
    json.context("failed to serialize delivery")
}
