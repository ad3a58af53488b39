//! Interaction capture helpers
//!
//! Pure functions that turn host observations into event records: which
//! market a page path addresses, and what a click on an element means.

mod dom;

pub use dom::{DomNode, Element};

use crate::types::EventRecord;

/// Attribute marking a market card (required for click capture)
pub const MARKET_ID_ATTR: &str = "data-market-id";

/// Optional attribute naming the feed section of a card
pub const SECTION_ATTR: &str = "data-section";

/// Optional attribute carrying the card's position in its section
pub const POSITION_ATTR: &str = "data-position";

/// Section reported when a card has none
pub const DEFAULT_SECTION: &str = "unknown";

const MARKET_SEGMENT: &str = "/market/";

/// Market id addressed by a page path, if any.
///
/// Matches the first non-empty segment that follows `/market/`. Full URLs are
/// accepted; query strings and fragments are ignored.
pub fn market_from_path(location: &str) -> Option<&str> {
    let path = path_of(location);
    path.match_indices(MARKET_SEGMENT).find_map(|(idx, _)| {
        let rest = &path[idx + MARKET_SEGMENT.len()..];
        let segment = rest.split('/').next().unwrap_or_default();
        (!segment.is_empty()).then_some(segment)
    })
}

fn path_of(location: &str) -> &str {
    let without_origin = match location.find("://") {
        Some(idx) => {
            let after_scheme = &location[idx + 3..];
            after_scheme
                .find('/')
                .map(|slash| &after_scheme[slash..])
                .unwrap_or("/")
        }
        None => location,
    };
    let end = without_origin
        .find(|c: char| c == '?' || c == '#')
        .unwrap_or(without_origin.len());
    &without_origin[..end]
}

/// What a click on a market card carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickTarget {
    pub market_id: String,
    pub section: String,
    pub position: i64,
}

impl ClickTarget {
    pub fn into_record(self) -> EventRecord {
        EventRecord::click(self.market_id, self.section, self.position)
    }
}

/// Resolve a click on `target` to the nearest enclosing market card.
pub fn click_target<N: DomNode>(target: &N) -> Option<ClickTarget> {
    let card = target.closest(MARKET_ID_ATTR)?;
    let market_id = card.attribute(MARKET_ID_ATTR)?.to_string();

    let section = card
        .attribute(SECTION_ATTR)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SECTION)
        .to_string();

    let position = card.attribute(POSITION_ATTR).map(parse_position).unwrap_or(0);

    Some(ClickTarget {
        market_id,
        section,
        position,
    })
}

/// Parse the leading integer of `raw` (`"3rd"` → 3). Anything unparsable is 0.
pub fn parse_position(raw: &str) -> i64 {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    digits[..end]
        .parse::<i64>()
        .map(|value| sign * value)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_from_path() {
        assert_eq!(market_from_path("/market/m42"), Some("m42"));
        assert_eq!(market_from_path("/market/m42/"), Some("m42"));
        assert_eq!(market_from_path("/en/market/m42/comments"), Some("m42"));
        assert_eq!(market_from_path("/market/m42?ref=feed#top"), Some("m42"));
        assert_eq!(
            market_from_path("https://currents.example.com/market/m42"),
            Some("m42")
        );
        assert_eq!(market_from_path("/market//market/m7"), Some("m7"));
        assert_eq!(market_from_path("/market/"), None);
        assert_eq!(market_from_path("/markets"), None);
        assert_eq!(market_from_path("/"), None);
        assert_eq!(market_from_path("https://currents.example.com"), None);
    }

    #[test]
    fn test_click_nested_in_card_without_section() {
        let card = Element::new("div").with_attr(MARKET_ID_ATTR, "m42");
        let target = Element::new("span").inside(Element::new("h3").inside(card));

        let click = click_target(&target).unwrap();
        assert_eq!(
            click,
            ClickTarget {
                market_id: "m42".to_string(),
                section: "unknown".to_string(),
                position: 0,
            }
        );

        let json = serde_json::to_value(click.into_record()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "market_id": "m42",
                "event_type": "click",
                "section": "unknown",
                "position": 0,
            })
        );
    }

    #[test]
    fn test_click_with_section_and_position() {
        let card = Element::new("a")
            .with_attr(MARKET_ID_ATTR, "m7")
            .with_attr(SECTION_ATTR, "trending")
            .with_attr(POSITION_ATTR, "4");

        let click = click_target(&card).unwrap();
        assert_eq!(click.section, "trending");
        assert_eq!(click.position, 4);
    }

    #[test]
    fn test_click_outside_card() {
        let target = Element::new("button").inside(Element::new("nav"));
        assert_eq!(click_target(&target), None);
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("12"), 12);
        assert_eq!(parse_position(" 3rd"), 3);
        assert_eq!(parse_position("-2"), -2);
        assert_eq!(parse_position(""), 0);
        assert_eq!(parse_position("abc"), 0);
        assert_eq!(parse_position("99999999999999999999"), 0);
    }
}
