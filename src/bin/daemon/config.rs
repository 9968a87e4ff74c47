//! Configuration Module
//!
//! This module provides constants and the runtime configuration of the zcmd daemon.
//! Values come from the built-in defaults, then an optional TOML file, then the
//! environment and command line (both handled by clap in `main`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{DaemonError, Result};

/// Constants for default settings
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5555;
/// Maximum accepted payload size (1MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;
/// Log filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Environment variables read for the bind address
pub const ENV_HOST: &str = "ZMQ_SERVER_HOST";
pub const ENV_PORT: &str = "ZMQ_SERVER_PORT";

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Host or interface address to bind
    pub host: String,
    /// TCP port to bind; 0 asks the OS for an ephemeral port
    pub port: u16,
    /// Optional log file, written in addition to stdout
    pub log_file: Option<PathBuf>,
    /// Payloads above this size are answered with a validation error
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_file: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl ServerConfig {
    /// Load the configuration, reading `path` when one is given
    ///
    /// # Arguments
    /// * `path` - Optional TOML configuration file
    ///
    /// # Returns
    /// * `Result<ServerConfig>` - The validated configuration or a fatal error
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let contents = fs::read_to_string(path).map_err(|source| DaemonError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&contents)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply command line / environment overrides on top of the loaded values
    pub fn with_overrides(
        mut self,
        host: Option<String>,
        port: Option<u16>,
        log_file: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if log_file.is_some() {
            self.log_file = log_file;
        }
        self.validate()?;
        Ok(self)
    }

    /// ZeroMQ endpoint the daemon binds to
    pub fn endpoint(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(DaemonError::InvalidConfig("host must not be empty".to_string()));
        }
        if self.max_message_size == 0 {
            return Err(DaemonError::InvalidConfig(
                "max_message_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
