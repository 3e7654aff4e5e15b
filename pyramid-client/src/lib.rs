//! # pyramid-client
//!
//! Host client for the Mahjong pyramid game running on a microcontroller,
//! reached over a serial link.
//!
//! ## Features
//!
//! - **Packet Exchange**: fixed 3-byte requests, per-command reply shapes,
//!   XOR checksums checked on every reply
//! - **Automatic Reconnection**: a silent device is detected by read timeout
//!   and the same endpoint is retried on a fixed interval
//! - **Link Abstraction**: pluggable link layer (serial, mock)
//! - **Pure State Machine**: uses pyramid-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use pyramid_client::{ClientConfig, GameClient, SerialLink};
//!
//! let client = GameClient::new(ClientConfig::default(), SerialLink::new());
//! client.connect("/dev/ttyACM0").await?;
//!
//! let board = client.new_game().await?;
//! client.click(0).await?;
//! client.click(1).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod protocol;
pub mod transport;

pub use client::{ClickOutcome, ClientError, ClientEvent, GameClient, ShuffleOutcome};
pub use config::ClientConfig;
pub use protocol::{ExchangeError, Protocol, ShuffleReply};
pub use transport::{Link, LinkError, MockLink, SerialLink};
