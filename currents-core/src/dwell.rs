//! Dwell classification
//!
//! Maps the time a page stayed open onto the coarse buckets reported at teardown.

use std::time::Duration;

use crate::types::EventType;

/// Lower bound (inclusive) of the `dwell_5+` bucket
pub const DWELL_SHORT_MS: u64 = 5_000;

/// Lower bound (inclusive) of the `dwell_30+` bucket
pub const DWELL_LONG_MS: u64 = 30_000;

/// Classify elapsed on-page time in milliseconds.
pub fn classify(elapsed_ms: u64) -> EventType {
    if elapsed_ms >= DWELL_LONG_MS {
        EventType::Dwell30
    } else if elapsed_ms >= DWELL_SHORT_MS {
        EventType::Dwell5
    } else {
        EventType::ViewMarket
    }
}

/// Classify a [`Duration`], saturating at `u64::MAX` milliseconds.
pub fn classify_duration(elapsed: Duration) -> EventType {
    classify(duration_ms(elapsed))
}

pub(crate) fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
