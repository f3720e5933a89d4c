//! Configuration types and loading for askpass-web.
//!
//! Configuration is read from `/etc/askpass-web/config.toml`. Every key is
//! optional; command-line flags override whatever the file provides.
//!
//! # Error Handling
//!
//! - If the config file doesn't exist, default values are returned.
//! - If the config file exists but is invalid, an error is returned (fail fast).
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! listen = "[::]:8080"        # ADDR:PORT, or fd:<n> for socket activation
//! idle_timeout = 300          # shut down after 5 idle minutes (0 = never)
//! grace_period = 30           # upper bound on graceful shutdown
//!
//! [ask]
//! directory = "/run/systemd/ask-password"
//! write_timeout = 10
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/askpass-web/config.toml";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Prompt directory configuration.
    pub ask: AskConfig,
}

/// Configuration for the HTTP listener and its lifecycle.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `ADDR:PORT` to bind, or `fd:<n>` to adopt an inherited socket
    /// (default: `[::]:8080`).
    pub listen: String,
    /// Seconds without requests before the server shuts itself down
    /// (default: 0, never).
    pub idle_timeout: u64,
    /// Seconds to wait for open connections once shutdown begins
    /// (default: 30).
    pub grace_period: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "[::]:8080".to_string(),
            idle_timeout: 0,
            grace_period: 30,
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period)
    }
}

/// Configuration for prompt discovery and delivery.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AskConfig {
    /// Directory holding `ask.*` prompt files
    /// (default: `/run/systemd/ask-password`).
    pub directory: PathBuf,
    /// Seconds allowed for writing an answer to a prompt socket (default: 10).
    pub write_timeout: u64,
}

impl Default for AskConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/run/systemd/ask-password"),
            write_timeout: 10,
        }
    }
}

impl AskConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout)
    }
}

impl Config {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from the default path.
    ///
    /// - Returns `Ok(Config::default())` if no config file exists.
    /// - Returns `Err` if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }
}
