//! Error types for the pyramid wire format.

use thiserror::Error;

/// Errors raised while building or checking packets.
///
/// None of these imply the link is down: the bytes arrived, they were
/// just not what the protocol allows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Packet had no bytes at all
    #[error("empty packet")]
    Empty,

    /// Trailing checksum does not match the XOR of the preceding bytes
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch {
        /// Checksum computed over the payload
        expected: u8,
        /// Checksum byte carried by the packet
        actual: u8,
    },

    /// Packet is not the length its command requires
    #[error("invalid packet length: expected {expected}, got {actual}")]
    Length {
        /// Required length
        expected: usize,
        /// Received length
        actual: usize,
    },

    /// Response echoes a different command than the one sent
    #[error("unexpected command echo: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedEcho {
        /// Command code of the request
        expected: u8,
        /// First byte of the response
        actual: u8,
    },

    /// Byte is not a known command code
    #[error("unknown command code: {0:#04x}")]
    UnknownCommand(u8),

    /// Flat index outside the 50-cell board
    #[error("board index out of range: {0}")]
    IndexOutOfRange(usize),
}
