//! Unified Error Handling System
//!
//! This module defines the error types of the zcmd daemon. [`CommandError`] is the
//! per-request taxonomy: every variant ends up as exactly one response on the wire.
//! [`DaemonError`] covers the fatal conditions that are allowed to stop the process.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while handling a single client request
#[derive(Error, Debug)]
pub enum CommandError {
    /// Payload is not decodable as JSON
    #[error("Invalid JSON format")]
    InvalidJson(#[source] serde_json::Error),

    /// Decoded request does not have the expected shape
    #[error("{0}")]
    Validation(String),

    /// A structurally valid command failed while running
    #[error("{message}")]
    Execution {
        message: String,
        /// Literal command line or expression that failed
        command: String,
    },

    /// Anything else; the detail stays in the server log
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CommandError {
    /// Build an execution error for the given command literal
    pub fn execution(message: impl Into<String>, command: impl Into<String>) -> Self {
        CommandError::Execution {
            message: message.into(),
            command: command.into(),
        }
    }
}

/// Result type for the request pipeline
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Fatal daemon errors (startup and signal wiring)
#[derive(Error, Debug)]
pub enum DaemonError {
    /// The ROUTER socket could not be bound (port in use, bad address)
    #[error("Failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: zeromq::ZmqError,
    },

    /// Configuration file could not be read
    #[error("Failed to read config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`crate::config::ServerConfig`]
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration values are out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Signal handlers could not be installed
    #[error("Failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),

    /// Log file could not be opened
    #[error("Failed to open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Global tracing subscriber was already set or failed to install
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Standardized result type for fatal daemon operations
pub type Result<T> = std::result::Result<T, DaemonError>;
