//! Interactive page session driven from stdin

use anyhow::{bail, Result};
use currents_core::capture::{Element, MARKET_ID_ATTR, POSITION_ATTR, SECTION_ATTR};
use currents_core::Extra;
use serde_json::Value;
use tokio::sync::mpsc;

pub const HELP: &str = "\
Commands:
  load <PATH>                          page load, e.g. load /market/btc-100k
  click <MARKET_ID> [SECTION] [POS]    click inside a market card
  track <EVENT_TYPE> [MARKET_ID] [key=value]...
  marker [VALUE]                       set the override marker (no value clears it)
  flush                                send queued events now
  whoami                               show the identity the next delivery uses
  help                                 show this message
  quit                                 tear the session down and exit";

/// One line of interactive input
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Load(String),
    Click(Element),
    Track {
        event_type: String,
        market_id: Option<String>,
        extra: Extra,
    },
    Marker(Option<String>),
    Flush,
    WhoAmI,
    Help,
    Quit,
    Empty,
}

impl Input {
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(Input::Empty);
        };
        let args: Vec<&str> = words.collect();

        let input = match (command, args.as_slice()) {
            ("load", [location]) => Input::Load(location.to_string()),
            ("click", [market, rest @ ..]) if rest.len() <= 2 => {
                Input::Click(card_click(market, rest.first().copied(), rest.get(1).copied()))
            }
            ("track", [event_type, rest @ ..]) => {
                let (market_id, pairs) = match rest.split_first() {
                    Some((first, pairs)) if !first.contains('=') => (Some(first.to_string()), pairs),
                    _ => (None, rest),
                };
                Input::Track {
                    event_type: event_type.to_string(),
                    market_id,
                    extra: parse_extra(pairs.iter().copied())?,
                }
            }
            ("marker", []) => Input::Marker(None),
            ("marker", [value]) => Input::Marker(Some(value.to_string())),
            ("flush", []) => Input::Flush,
            ("whoami", []) => Input::WhoAmI,
            ("help" | "?", _) => Input::Help,
            ("quit" | "exit", []) => Input::Quit,
            _ => bail!("unrecognized input: {} (type 'help')", line.trim()),
        };
        Ok(input)
    }
}

/// A span inside a market card, the shape a real click produces
fn card_click(market: &str, section: Option<&str>, position: Option<&str>) -> Element {
    let mut card = Element::new("article").with_attr(MARKET_ID_ATTR, market);
    if let Some(section) = section {
        card = card.with_attr(SECTION_ATTR, section);
    }
    if let Some(position) = position {
        card = card.with_attr(POSITION_ATTR, position);
    }
    Element::new("span").inside(card)
}

/// Read stdin lines on a plain thread.
///
/// The thread is detached, so a read still blocked at teardown never delays
/// exit.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Parse `key=value` pairs into event extras.
///
/// Values that parse as JSON scalars (numbers, booleans) keep their type;
/// everything else is a string.
pub fn parse_extra<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Result<Extra> {
    let mut extra = Extra::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("expected key=value, got '{}'", pair);
        };
        if key.is_empty() {
            bail!("empty key in '{}'", pair);
        }
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
            _ => Value::String(raw.to_string()),
        };
        extra.insert(key.to_string(), value);
    }
    Ok(extra)
}
