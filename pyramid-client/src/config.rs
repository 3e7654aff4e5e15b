//! Session configuration.

use pyramid_types::Addressing;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Link and timing settings for a [`GameClient`](crate::GameClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Baud rate (default: 115200, the firmware's USART setting).
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Time allowed for each reply in milliseconds (default: 2000).
    /// Silence for this long is treated as a lost link.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Delay between reconnect attempts in milliseconds (default: 2000).
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// How long DTR is held low during a reset pulse (default: 100).
    #[serde(default = "default_reset_hold_ms")]
    pub reset_hold_ms: u64,
    /// Wait after a reset pulse for the device to boot (default: 500).
    #[serde(default = "default_boot_delay_ms")]
    pub boot_delay_ms: u64,
    /// How SELECT/MATCH address a tile (default: flat index).
    #[serde(default)]
    pub addressing: Addressing,
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_read_timeout_ms() -> u64 {
    2000
}

fn default_reconnect_interval_ms() -> u64 {
    2000
}

fn default_reset_hold_ms() -> u64 {
    100
}

fn default_boot_delay_ms() -> u64 {
    500
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            reset_hold_ms: default_reset_hold_ms(),
            boot_delay_ms: default_boot_delay_ms(),
            addressing: Addressing::default(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with firmware defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the per-reply read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the reconnect interval.
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the reset pulse timing.
    pub fn with_reset_timing(mut self, hold: Duration, boot: Duration) -> Self {
        self.reset_hold_ms = hold.as_millis() as u64;
        self.boot_delay_ms = boot.as_millis() as u64;
        self
    }

    /// Set the tile addressing convention.
    pub fn with_addressing(mut self, addressing: Addressing) -> Self {
        self.addressing = addressing;
        self
    }

    /// Per-reply read timeout.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Delay between reconnect attempts.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// DTR low time.
    pub fn reset_hold(&self) -> Duration {
        Duration::from_millis(self.reset_hold_ms)
    }

    /// Device boot wait.
    pub fn boot_delay(&self) -> Duration {
        Duration::from_millis(self.boot_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_firmware() {
        let config = ClientConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.read_timeout(), Duration::from_secs(2));
        assert_eq!(config.reconnect_interval(), Duration::from_secs(2));
        assert_eq!(config.reset_hold(), Duration::from_millis(100));
        assert_eq!(config.boot_delay(), Duration::from_millis(500));
        assert_eq!(config.addressing, Addressing::Flat);
    }

    #[test]
    fn builder_overrides() {
        let config = ClientConfig::new()
            .with_baud_rate(9600)
            .with_read_timeout(Duration::from_millis(1500))
            .with_reconnect_interval(Duration::from_millis(250))
            .with_reset_timing(Duration::ZERO, Duration::ZERO)
            .with_addressing(Addressing::Coordinate);

        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.read_timeout_ms, 1500);
        assert_eq!(config.reconnect_interval_ms, 250);
        assert_eq!(config.boot_delay_ms, 0);
        assert_eq!(config.addressing, Addressing::Coordinate);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            read_timeout_ms = 1500
            addressing = "coordinate"
        "#,
        )
        .unwrap();

        assert_eq!(config.read_timeout_ms, 1500);
        assert_eq!(config.addressing, Addressing::Coordinate);
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.reconnect_interval_ms, 2000);
    }

    #[test]
    fn empty_toml_is_default() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
    }
}
