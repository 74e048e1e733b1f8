//! File-backed tracing setup.
//!
//! The TUI owns stdout, so diagnostics always go to a log file.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Installs a global fmt subscriber writing to `path`.
///
/// The filter comes from `RUST_LOG` when set and parsable, otherwise `default_filter`.
pub fn init_file_logging(path: &Path, default_filter: &str) -> Result<(), LoggingError> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(log_file))
        .try_init()
        .map_err(|_| LoggingError::AlreadyInstalled)
}
