//! Link abstraction for the pyramid device.
//!
//! This module provides a pluggable transport layer over one half-duplex
//! serial endpoint (a real port, or a mock for testing).
//!
//! # Design
//!
//! The link trait is async and owns the port handle exclusively:
//! - `open()` opens an endpoint at a fixed baud rate
//! - `reset_pulse()` toggles DTR to reboot the device
//! - `write_all()` / `read_exact()` move raw bytes
//! - `flush_input()` drops stale bytes before a new request
//! - `close()` is idempotent
//!
//! There is no link-level disconnect event. A read that returns nothing
//! before its timeout is the only sign that the device went away, which is
//! why [`LinkError::Timeout`] is kept apart from [`LinkError::ShortRead`].
//!
//! # Example
//!
//! ```ignore
//! let link = SerialLink::new();
//! link.open("/dev/ttyACM0", 115_200).await?;
//! link.reset_pulse(Duration::from_millis(100), Duration::from_millis(500)).await?;
//! link.write_all(&[0x01, 0x00, 0x01]).await?;
//! let reply = link.read_exact(52, Duration::from_secs(2)).await?;
//! ```

mod mock;
mod serial;

pub use mock::MockLink;
pub use serial::SerialLink;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Link errors.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The endpoint is absent, busy or not permitted.
    #[error("failed to open {endpoint}: {reason}")]
    OpenFailed {
        /// Endpoint name
        endpoint: String,
        /// Platform error text
        reason: String,
    },

    /// No endpoint is open.
    #[error("link not open")]
    NotOpen,

    /// Nothing arrived before the read timeout.
    #[error("no reply before read timeout")]
    Timeout,

    /// Some, but not all, of the expected bytes arrived.
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead {
        /// Bytes requested
        expected: usize,
        /// Bytes that arrived before the timeout
        received: usize,
    },

    /// Read, write or control-line failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// One serial endpoint.
///
/// Implementations serialise access internally; callers still run one
/// request/response exchange at a time.
#[async_trait]
pub trait Link: Send + Sync {
    /// Open `endpoint` at `baud_rate`, closing any previously open handle.
    async fn open(&self, endpoint: &str, baud_rate: u32) -> Result<(), LinkError>;

    /// Close the handle. Safe to call when nothing is open.
    async fn close(&self) -> Result<(), LinkError>;

    /// Drive DTR low for `hold`, then high, then wait `boot` for the device
    /// to come up. Does nothing if the link is not open.
    async fn reset_pulse(&self, hold: Duration, boot: Duration) -> Result<(), LinkError>;

    /// Write every byte.
    async fn write_all(&self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Read exactly `count` bytes, waiting at most `timeout` overall.
    ///
    /// Zero bytes after the full timeout is [`LinkError::Timeout`]; a
    /// partial read is [`LinkError::ShortRead`].
    async fn read_exact(&self, count: usize, timeout: Duration) -> Result<Vec<u8>, LinkError>;

    /// Discard any buffered, unread input.
    async fn flush_input(&self) -> Result<(), LinkError>;

    /// Endpoint names present right now. Callers re-poll rather than cache.
    async fn list_endpoints(&self) -> Result<Vec<String>, LinkError>;

    /// Whether a handle is open.
    async fn is_open(&self) -> bool;
}
