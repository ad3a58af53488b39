//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/currents/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/currents/` (~/.config/currents/)
//! - Data: `$XDG_DATA_HOME/currents/` (~/.local/share/currents/)
//! - State/Logs: `$XDG_STATE_HOME/currents/` (~/.local/state/currents/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Capture, batching and delivery settings
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Tracking pipeline configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TrackingConfig {
    /// Base URL of the collection endpoint (e.g., `https://currents.example.com`)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Path receiving batched events
    #[serde(default = "default_batch_path")]
    pub batch_path: String,

    /// Path receiving the single departure event
    #[serde(default = "default_beacon_path")]
    pub beacon_path: String,

    /// Queue length that triggers an immediate flush
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Quiet period before a partial batch is flushed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Durable storage key holding the anonymous user key
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Name of the override marker (test user cookie)
    #[serde(default = "default_override_marker")]
    pub override_marker: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            batch_path: default_batch_path(),
            beacon_path: default_beacon_path(),
            batch_size: default_batch_size(),
            debounce_ms: default_debounce_ms(),
            storage_key: default_storage_key(),
            override_marker: default_override_marker(),
        }
    }
}

impl TrackingConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(Error::Config("tracking.endpoint is required".to_string()));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(Error::Config(format!(
                "tracking.endpoint must be an http(s) URL, got {}",
                endpoint
            )));
        }
        for (name, path) in [
            ("batch_path", &self.batch_path),
            ("beacon_path", &self.beacon_path),
        ] {
            if !path.starts_with('/') {
                return Err(Error::Config(format!(
                    "tracking.{} must start with '/', got {}",
                    name, path
                )));
            }
        }
        if self.batch_size == 0 {
            return Err(Error::Config(
                "tracking.batch_size must be at least 1".to_string(),
            ));
        }
        if self.debounce_ms == 0 {
            return Err(Error::Config(
                "tracking.debounce_ms must be at least 1".to_string(),
            ));
        }
        if self.storage_key.is_empty() || self.override_marker.is_empty() {
            return Err(Error::Config(
                "tracking.storage_key and tracking.override_marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Full URL of the batch endpoint
    pub fn batch_url(&self) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), self.batch_path)
    }

    /// Full URL of the beacon endpoint
    pub fn beacon_url(&self) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), self.beacon_path)
    }

    /// Debounce window as a [`Duration`]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_endpoint() -> String {
    "http://localhost:5000".to_string()
}

fn default_batch_path() -> String {
    "/api/track/batch".to_string()
}

fn default_beacon_path() -> String {
    "/api/track".to_string()
}

fn default_batch_size() -> usize {
    5
}

fn default_debounce_ms() -> u64 {
    3000
}

fn default_storage_key() -> String {
    "currents_user_key".to_string()
}

fn default_override_marker() -> String {
    "currents_test_user".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.tracking.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/currents/config.toml` (~/.config/currents/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("currents").join("config.toml")
    }

    /// Returns the data directory path (for durable key storage)
    ///
    /// `$XDG_DATA_HOME/currents/` (~/.local/share/currents/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("currents")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/currents/` (~/.local/state/currents/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("currents")
    }

    /// Returns the durable key storage file path
    ///
    /// `$XDG_DATA_HOME/currents/storage.json`
    pub fn storage_path() -> PathBuf {
        Self::data_dir().join("storage.json")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/currents/currents.log` (~/.local/state/currents/currents.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("currents.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
