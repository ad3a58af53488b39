//! Override marker (test user cookie)
//!
//! A short-lived, page-scoped value that replaces the anonymous identity while
//! it is present. The marker is a shared handle: setting it on one clone is
//! visible to every resolver holding another clone.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
struct MarkerValue {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Shared handle to the override marker.
#[derive(Debug, Clone)]
pub struct OverrideMarker {
    name: String,
    slot: Arc<RwLock<Option<MarkerValue>>>,
}

impl OverrideMarker {
    /// Create an unset marker with the given cookie name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a marker initialised from a `Cookie` header value.
    pub fn from_cookie_header(name: impl Into<String>, header: &str) -> Self {
        let marker = Self::new(name);
        if let Some(value) = cookie_value(header, &marker.name) {
            marker.set(value);
        }
        marker
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set a marker that never expires on its own.
    pub fn set(&self, value: impl Into<String>) {
        self.store(Some(MarkerValue {
            value: value.into(),
            expires_at: None,
        }));
    }

    /// Set a marker valid for `ttl` from now.
    pub fn set_with_ttl(&self, value: impl Into<String>, ttl: Duration) {
        self.store(Some(MarkerValue {
            value: value.into(),
            expires_at: Some(Utc::now() + ttl),
        }));
    }

    pub fn clear(&self) {
        self.store(None);
    }

    /// Current marker value, `None` if unset, empty or expired.
    pub fn current(&self) -> Option<String> {
        self.current_at(Utc::now())
    }

    pub fn is_set(&self) -> bool {
        self.current().is_some()
    }

    fn current_at(&self, now: DateTime<Utc>) -> Option<String> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        let marker = slot.as_ref()?;
        if marker.value.is_empty() {
            return None;
        }
        match marker.expires_at {
            Some(expires_at) if expires_at <= now => None,
            _ => Some(marker.value.clone()),
        }
    }

    fn store(&self, value: Option<MarkerValue>) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = value;
    }
}

/// Extract a cookie value by exact name from a `name=value; other=value` header.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
