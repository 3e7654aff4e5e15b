//! # pyramid-types
//!
//! Wire format types for the Mahjong pyramid serial protocol.
//!
//! This crate provides the foundational types used across all pyramid crates:
//! - [`Command`] and the per-command sentinels - the fixed firmware command set
//! - [`encode_request`], [`checksum`], [`validate`] - the XOR packet codec
//! - [`Tile`], [`TileGroup`] - tile byte decoding
//! - [`Layer`], [`Position`], [`CoordByte`], [`Addressing`] - pyramid geometry
//!   and the two SELECT/MATCH addressing conventions
//! - [`PacketError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod command;
mod error;
mod geometry;
mod packet;
mod tile;

pub use command::{sentinel, Command};
pub use error::PacketError;
pub use geometry::{Addressing, CoordByte, Layer, Position, BOARD_SIZE};
pub use packet::{
    checksum, encode_request, validate, BoardPacket, Request, StatusPacket, BOARD_PACKET_LEN,
    REQUEST_LEN, STATUS_PACKET_LEN,
};
pub use tile::{Tile, TileGroup};
