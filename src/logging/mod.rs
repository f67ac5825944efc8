//! Logging setup for the headless runner
//! Console plus an append-only file under the logs dir, 7-day retention

use crate::error::FileError;
use log::info;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_RETENTION_DAYS: u64 = 7;
const LOG_FILE_NAME: &str = "debrisflow.log";

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` level.
///
/// `log` records from library code are bridged into tracing, so both macro
/// families end up in the same sinks.
pub fn init_logging(logs_dir: &Path) -> Result<(), FileError> {
    fs::create_dir_all(logs_dir).map_err(|source| FileError::Io {
        action: "create directory",
        path: logs_dir.to_path_buf(),
        source,
    })?;

    let log_path = logs_dir.join(LOG_FILE_NAME);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|source| FileError::Io {
            action: "open",
            path: log_path.clone(),
            source,
        })?;

    tracing_log::LogTracer::init().ok(); // ok() in case already initialized

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer().with_target(true);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();

    info!("Logging to {:?}", log_path);
    Ok(())
}

/// Deletes `.log` files older than the retention window. Returns how many were removed.
pub fn cleanup_old_logs(logs_dir: &Path) -> usize {
    if !logs_dir.exists() {
        return 0;
    }

    let retention = Duration::from_secs(LOG_RETENTION_DAYS * 24 * 60 * 60);
    let now = SystemTime::now();
    let mut removed = 0;

    if let Ok(entries) = fs::read_dir(logs_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "log") {
                let expired = fs::metadata(&path)
                    .and_then(|meta| meta.modified())
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok())
                    .map_or(false, |age| age > retention);
                if expired && fs::remove_file(&path).is_ok() {
                    info!("Cleaned up old log: {:?}", path.file_name());
                    removed += 1;
                }
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_keeps_recent_logs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("today.log"), b"line").unwrap();
        fs::write(dir.path().join("notes.txt"), b"line").unwrap();

        assert_eq!(cleanup_old_logs(dir.path()), 0);
        assert!(dir.path().join("today.log").exists());
    }

    #[test]
    fn test_cleanup_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(&dir.path().join("absent")), 0);
    }
}
