//! Scripted page sessions
//!
//! A replay script is a TOML file with an ordered list of steps:
//!
//! ```toml
//! [[step]]
//! action = "load"
//! location = "/market/btc-100k"
//!
//! [[step]]
//! action = "click"
//! target = { tag = "span", parent = { tag = "article", attributes = { "data-market-id" = "m42" } } }
//!
//! [[step]]
//! action = "wait"
//! ms = 3500
//! ```
//!
//! Steps run against a live tracker, so `wait` lets the debounce timer fire
//! exactly as it would in a real page.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use currents_core::capture::Element;
use currents_core::identity::OverrideMarker;
use currents_core::{Extra, TeardownReport, TrackerHandle};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Load {
        location: String,
    },
    Click {
        target: Element,
    },
    Track {
        event_type: String,
        #[serde(default)]
        market_id: Option<String>,
        #[serde(default)]
        extra: Extra,
    },
    Wait {
        ms: u64,
    },
    /// Set the override marker, or clear it when `value` is omitted
    Marker {
        #[serde(default)]
        value: Option<String>,
    },
    Flush,
    Teardown,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay script {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid replay script {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let script: Script = toml::from_str(content)?;
        if let Some(pos) = script
            .steps
            .iter()
            .position(|step| *step == Step::Teardown)
        {
            if pos + 1 != script.steps.len() {
                bail!("teardown must be the last step (found at step {})", pos + 1);
            }
        }
        Ok(script)
    }
}

/// Run every step; tears the session down at the end if the script did not.
pub async fn run(
    script: &Script,
    handle: &TrackerHandle,
    marker: &OverrideMarker,
) -> Result<TeardownReport> {
    for (index, step) in script.steps.iter().enumerate() {
        println!("  [{:>3}] {}", index + 1, describe(step));
        tracing::debug!(step = index + 1, ?step, "Replaying step");

        match step {
            Step::Load { location } => handle.load(location.clone())?,
            Step::Click { target } => handle.click(target.clone())?,
            Step::Track {
                event_type,
                market_id,
                extra,
            } => handle.track_event(event_type, market_id.as_deref(), Some(extra.clone()))?,
            Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Step::Marker { value: Some(value) } => marker.set(value.clone()),
            Step::Marker { value: None } => marker.clear(),
            Step::Flush => handle.flush()?,
            Step::Teardown => break,
        }
    }

    Ok(handle.teardown().await?)
}

fn describe(step: &Step) -> String {
    match step {
        Step::Load { location } => format!("load {}", location),
        Step::Click { target } => format!("click <{}> (depth {})", target.tag, target.depth()),
        Step::Track {
            event_type,
            market_id,
            ..
        } => match market_id {
            Some(market) => format!("track {} on {}", event_type, market),
            None => format!("track {}", event_type),
        },
        Step::Wait { ms } => format!("wait {}ms", ms),
        Step::Marker { value: Some(value) } => format!("marker = {}", value),
        Step::Marker { value: None } => "marker cleared".to_string(),
        Step::Flush => "flush".to_string(),
        Step::Teardown => "teardown".to_string(),
    }
}
