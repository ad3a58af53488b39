//! # currents-core
//!
//! Core library for currents client-side interaction tracking.
//!
//! This library provides:
//! - Domain types for captured events and user identity
//! - Capture helpers for page loads, clicks and manual events
//! - A page [`Session`] that queues, batches and delivers events
//! - HTTP delivery with a batch channel and a teardown beacon channel
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Events flow in one direction:
//! - **Capture:** page load, clicks and manual calls produce [`EventRecord`]s
//! - **Queue + scheduler:** records wait until 5 are queued or 3s pass quietly
//! - **Transport:** the queue is drained into one batch, tagged with the
//!   identity resolved at that moment; teardown adds one dwell beacon
//!
//! Delivery is best-effort: failures are logged and dropped, never retried.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use currents_core::identity::{FileKeyStore, IdentityResolver, OverrideMarker};
//! use currents_core::transport::HttpTransport;
//! use currents_core::{Config, Session};
//!
//! # async fn run() -> currents_core::Result<()> {
//! let config = Config::load()?;
//! let tracking = &config.tracking;
//!
//! let resolver = IdentityResolver::new(
//!     Arc::new(FileKeyStore::new(Config::storage_path())),
//!     OverrideMarker::new(tracking.override_marker.clone()),
//!     tracking.storage_key.clone(),
//! );
//! let transport = Arc::new(HttpTransport::new(tracking)?);
//!
//! let handle = currents_core::session::spawn(Session::new(tracking, resolver, transport.clone()));
//! handle.load("/market/btc-100k")?;
//! handle.track_event("share", None, None)?;
//! handle.teardown().await?;
//! transport.settle().await;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use session::{Session, TeardownReport, TrackerHandle};
pub use types::*;

// Public modules
pub mod capture;
pub mod config;
pub mod dwell;
pub mod error;
pub mod identity;
pub mod logging;
pub mod session;
pub mod transport;
pub mod types;
