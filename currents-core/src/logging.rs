//! File logging for hosts that opt in
//!
//! Tracking never writes to stdout or stderr. When a host enables logging,
//! records go to daily files `currents.<date>.log` under the XDG state
//! directory, and `RUST_LOG` takes precedence over `[logging] level`.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};

const FILE_PREFIX: &str = "currents";
const FILE_SUFFIX: &str = "log";

/// Keeps the background log writer running; pending lines are flushed on drop.
#[must_use = "logging stops when the guard is dropped"]
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

/// Install the global subscriber writing to the state directory.
///
/// Fails if a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let (writer, worker) = tracing_appender::non_blocking(file_appender(&log_dir, config.max_files)?);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install logger: {}", e)))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        max_files = config.max_files,
        "File logging enabled"
    );

    Ok(LoggingGuard { _worker: worker })
}

/// Daily-rotated appender keeping at most `max_files` files (at least one).
fn file_appender(dir: &Path, max_files: usize) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(FILE_PREFIX)
        .filename_suffix(FILE_SUFFIX)
        .max_log_files(max_files.max(1))
        .build(dir)
        .map_err(|e| Error::Config(format!("failed to create log appender in {:?}: {}", dir, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_appender_writes_dated_file() {
        let dir = TempDir::new().unwrap();
        let mut appender = file_appender(dir.path(), 0).unwrap();
        appender.write_all(b"flushed 3 events\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("currents."));
        assert!(names[0].ends_with(".log"));

        let content = std::fs::read_to_string(dir.path().join(&names[0])).unwrap();
        assert_eq!(content, "flushed 3 events\n");
    }

    #[test]
    fn test_appender_rejects_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("no/such/dir");
        std::fs::write(dir.path().join("no"), b"not a directory").unwrap();
        assert!(matches!(file_appender(&missing, 5), Err(Error::Config(_))));
    }
}
