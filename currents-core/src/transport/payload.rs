//! Wire payloads for the collection endpoint
//!
//! ```text
//! POST /api/track/batch   {"user_key": "...", "events": [{"market_id": .., "event_type": .., ...}]}
//! POST /api/track         {"user_key": "...", "market_id": "...", "event_type": "...", "dwell_ms": 1234}
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{EventRecord, EventType, UserKey};

/// Events drained from the queue in one flush
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    /// Identity resolved at flush time
    pub user_key: String,

    /// Events in enqueue order
    pub events: Vec<EventRecord>,
}

impl EventBatch {
    pub fn new(user_key: &UserKey, events: Vec<EventRecord>) -> Self {
        Self {
            user_key: user_key.as_str().to_string(),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// The single departure event sent at teardown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconPayload {
    pub user_key: String,
    pub market_id: String,
    pub event_type: EventType,
    /// Time between load and teardown
    pub dwell_ms: u64,
}

impl BeaconPayload {
    pub fn new(user_key: &UserKey, market_id: impl Into<String>, event_type: EventType, dwell_ms: u64) -> Self {
        Self {
            user_key: user_key.as_str().to_string(),
            market_id: market_id.into(),
            event_type,
            dwell_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_wire_shape() {
        let key = UserKey::Anonymous("anon_abc123xyz".to_string());
        let batch = EventBatch::new(
            &key,
            vec![
                EventRecord::new(EventType::ViewMarket, Some("m1".to_string())),
                EventRecord::click("m2", "hero", 1),
            ],
        );

        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["user_key"], "anon_abc123xyz");
        assert_eq!(json["events"][0]["event_type"], "view_market");
        assert_eq!(json["events"][1]["section"], "hero");
        assert_eq!(json["events"][1]["position"], 1);
    }

    #[test]
    fn test_beacon_wire_shape() {
        let key = UserKey::Override("roy".to_string());
        let beacon = BeaconPayload::new(&key, "m7", EventType::Dwell30, 31_250);

        assert_eq!(
            serde_json::to_value(&beacon).unwrap(),
            serde_json::json!({
                "user_key": "roy",
                "market_id": "m7",
                "event_type": "dwell_30+",
                "dwell_ms": 31250,
            })
        );
    }
}
