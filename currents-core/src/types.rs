//! Core domain types for currents tracking
//!
//! These types describe what the pipeline captures and who it attributes it to.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Market** | The entity a page or card is about, addressed by `market_id` |
//! | **Event** | One captured interaction ([`EventRecord`]) waiting in the queue |
//! | **Extra** | Free-form fields merged flat into an event (`section`, `position`, ...) |
//! | **User key** | The identity attached to every delivery ([`UserKey`]) |
//! | **Beacon** | The single departure event sent at teardown |

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Free-form fields flattened into a serialized [`EventRecord`].
pub type Extra = serde_json::Map<String, serde_json::Value>;

// ============================================
// Event Type
// ============================================

/// Tag describing what happened.
///
/// The set is open: anything that is not one of the built-in tags is kept as
/// [`EventType::Custom`]. Parsing never yields an empty tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EventType {
    /// A market detail page was opened
    ViewMarket,
    /// A market card was clicked
    Click,
    /// The page stayed open for at least 5 seconds
    Dwell5,
    /// The page stayed open for at least 30 seconds
    Dwell30,
    /// Caller-supplied tag
    Custom(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::ViewMarket => "view_market",
            EventType::Click => "click",
            EventType::Dwell5 => "dwell_5+",
            EventType::Dwell30 => "dwell_30+",
            EventType::Custom(tag) => tag,
        }
    }

    /// Parse a tag, mapping built-in names onto their variants.
    pub fn parse(tag: &str) -> Result<Self> {
        let tag = tag.trim();
        match tag {
            "" => Err(Error::InvalidEvent("event_type must not be empty".to_string())),
            "view_market" => Ok(EventType::ViewMarket),
            "click" => Ok(EventType::Click),
            "dwell_5+" => Ok(EventType::Dwell5),
            "dwell_30+" => Ok(EventType::Dwell30),
            other => Ok(EventType::Custom(other.to_string())),
        }
    }

    /// True for the dwell buckets produced at teardown.
    pub fn is_dwell(&self) -> bool {
        matches!(self, EventType::Dwell5 | EventType::Dwell30)
    }
}

impl std::str::FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EventType::parse(s)
    }
}

impl TryFrom<String> for EventType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        EventType::parse(&value)
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        match value {
            EventType::Custom(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Event Record
// ============================================

/// One captured interaction.
///
/// Serializes as a flat object: `{"market_id": .., "event_type": .., <extra>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Subject market; `None` only when no market context exists
    pub market_id: Option<String>,
    pub event_type: EventType,
    #[serde(flatten)]
    pub extra: Extra,
}

impl EventRecord {
    pub fn new(event_type: EventType, market_id: Option<String>) -> Self {
        Self {
            market_id,
            event_type,
            extra: Extra::new(),
        }
    }

    /// Add one extra field. `market_id` and `event_type` are reserved and ignored.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let key = key.into();
        if !is_reserved_key(&key) {
            self.extra.insert(key, value.into());
        }
        self
    }

    /// Merge a whole map of extra fields, skipping reserved keys.
    pub fn merge_extra(mut self, extra: Extra) -> Self {
        for (key, value) in extra {
            if !is_reserved_key(&key) {
                self.extra.insert(key, value);
            }
        }
        self
    }

    /// Click on a market card.
    pub fn click(market_id: impl Into<String>, section: impl Into<String>, position: i64) -> Self {
        let section: String = section.into();
        EventRecord::new(EventType::Click, Some(market_id.into()))
            .with_extra("section", section)
            .with_extra("position", position)
    }
}

fn is_reserved_key(key: &str) -> bool {
    key == "market_id" || key == "event_type"
}

// ============================================
// User Key
// ============================================

/// Identity attached to a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserKey {
    /// Persisted `anon_xxxxxxxxx` token
    Anonymous(String),
    /// Value of the override marker, used verbatim
    Override(String),
}

impl UserKey {
    pub fn as_str(&self) -> &str {
        match self {
            UserKey::Anonymous(key) | UserKey::Override(key) => key,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, UserKey::Anonymous(_))
    }

    /// Key as shown in logs: anonymous tokens are not printed.
    pub fn display_key(&self) -> &str {
        match self {
            UserKey::Anonymous(_) => "anonymous",
            UserKey::Override(key) => key,
        }
    }

    /// Human-readable tracking mode
    pub fn mode(&self) -> &'static str {
        match self {
            UserKey::Anonymous(_) => "Anonymous",
            UserKey::Override(_) => "Test User",
        }
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
