//! Configuration loading for the pyramid CLI.
//!
//! Configuration is loaded from a TOML file (default: `pyramid.toml` in the
//! user config directory). Every key is optional.
//!
//! ```toml
//! port = "/dev/ttyACM0"
//!
//! [link]
//! baud_rate = 115200
//! read_timeout_ms = 2000
//! reset_hold_ms = 100
//! boot_delay_ms = 500
//!
//! [session]
//! reconnect_interval_ms = 2000
//! addressing = "flat"
//! ```

use pyramid_client::ClientConfig;
use pyramid_types::Addressing;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for the CLI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Endpoint used when `--port` is not given.
    pub port: Option<String>,
    /// Serial link settings.
    #[serde(default)]
    pub link: LinkConfig,
    /// Session settings.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Serial link overrides. Unset keys keep the firmware defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkConfig {
    /// Baud rate.
    pub baud_rate: Option<u32>,
    /// Per-reply read timeout in milliseconds.
    pub read_timeout_ms: Option<u64>,
    /// DTR low time during a reset pulse, in milliseconds.
    pub reset_hold_ms: Option<u64>,
    /// Wait for the device to boot after a reset pulse, in milliseconds.
    pub boot_delay_ms: Option<u64>,
}

/// Session overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Delay between reconnect attempts in milliseconds.
    pub reconnect_interval_ms: Option<u64>,
    /// Tile addressing used by SELECT/MATCH.
    pub addressing: Option<Addressing>,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `explicit` if given, otherwise the default file if it exists,
    /// otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Client settings with the file's overrides applied.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(baud_rate) = self.link.baud_rate {
            config = config.with_baud_rate(baud_rate);
        }
        if let Some(ms) = self.link.read_timeout_ms {
            config = config.with_read_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.link.reset_hold_ms {
            config.reset_hold_ms = ms;
        }
        if let Some(ms) = self.link.boot_delay_ms {
            config.boot_delay_ms = ms;
        }
        if let Some(ms) = self.session.reconnect_interval_ms {
            config = config.with_reconnect_interval(Duration::from_millis(ms));
        }
        if let Some(addressing) = self.session.addressing {
            config = config.with_addressing(addressing);
        }
        config
    }
}

/// Get the default config file path for the CLI.
pub fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "ydun", "pyramid")
        .map(|dirs| dirs.config_dir().join("pyramid.toml"))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
