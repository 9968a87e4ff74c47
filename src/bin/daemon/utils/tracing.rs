//! Tracing Utilities Module
//!
//! This module contains tracing functionality for the zcmd daemon,
//! including logging configuration with optional file output.

use std::fs::OpenOptions;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::DEFAULT_LOG_FILTER;
use crate::error::{DaemonError, Result};

/// Initializes the tracing subscriber with console and optional file output
///
/// The filter comes from `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`].
///
/// # Arguments
/// * `log_file` - File to append logs to, in addition to stdout
///
/// # Returns
/// * `Result<Option<WorkerGuard>>` - The file writer guard; keep it alive for the
///   lifetime of the process so buffered lines are flushed on exit
pub fn setup_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)
                .map_err(|source| DaemonError::LogFile {
                    path: path.to_path_buf(),
                    source,
                })?;

            // Non-blocking writer so request tasks never wait on disk
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| DaemonError::Logging(e.to_string()))?;

    Ok(guard)
}
