//! Packet codec for the pyramid serial protocol.
//!
//! # Wire Format
//!
//! ```text
//! Request (always 3 bytes):
//! ┌─────────┬────────┬────────────────┐
//! │ command │  data  │ command ^ data │
//! └─────────┴────────┴────────────────┘
//!
//! Status response (3 bytes):
//! ┌─────────┬────────┬───────────────────┐
//! │  echo   │ status │ echo ^ status     │
//! └─────────┴────────┴───────────────────┘
//!
//! Board response (52 bytes):
//! ┌─────────┬──────────────────┬──────────────────────┐
//! │  echo   │  50 tile bytes   │ XOR of bytes 0..=50  │
//! └─────────┴──────────────────┴──────────────────────┘
//! ```
//!
//! Every packet, in either direction, ends in a checksum byte equal to
//! the XOR of all preceding bytes.

use crate::{Command, PacketError, BOARD_SIZE};

/// Length of every outgoing request.
pub const REQUEST_LEN: usize = 3;

/// Length of a status / acknowledgement response.
pub const STATUS_PACKET_LEN: usize = 3;

/// Length of a response carrying a full board.
pub const BOARD_PACKET_LEN: usize = BOARD_SIZE + 2;

/// XOR-fold of all given bytes.
///
/// Named "CRC" by the firmware, but it is a plain parity byte.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Build a 3-byte request `[cmd, data, cmd ^ data]`.
pub fn encode_request(cmd: u8, data: u8) -> [u8; REQUEST_LEN] {
    [cmd, data, cmd ^ data]
}

/// Check the trailing checksum of a packet and strip it.
///
/// Returns the payload (all bytes but the last) when the last byte equals
/// the XOR of the others.
pub fn validate(packet: &[u8]) -> Result<&[u8], PacketError> {
    let (last, payload) = packet.split_last().ok_or(PacketError::Empty)?;
    let expected = checksum(payload);
    if expected != *last {
        return Err(PacketError::ChecksumMismatch {
            expected,
            actual: *last,
        });
    }
    Ok(payload)
}

fn check_echo(payload: &[u8], command: Command) -> Result<(), PacketError> {
    let echo = payload.first().copied().ok_or(PacketError::Empty)?;
    if echo != command.code() {
        return Err(PacketError::UnexpectedEcho {
            expected: command.code(),
            actual: echo,
        });
    }
    Ok(())
}

fn check_len(packet: &[u8], expected: usize) -> Result<(), PacketError> {
    if packet.len() != expected {
        return Err(PacketError::Length {
            expected,
            actual: packet.len(),
        });
    }
    Ok(())
}

/// An outgoing command with its data byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// Command to run
    pub command: Command,
    /// Argument byte (tile address for SELECT/MATCH, otherwise unused)
    pub data: u8,
}

impl Request {
    /// Create a request with an explicit data byte.
    pub fn new(command: Command, data: u8) -> Self {
        Self { command, data }
    }

    /// Create a request for a command that takes no argument.
    pub fn bare(command: Command) -> Self {
        Self::new(command, crate::sentinel::UNUSED_DATA)
    }

    /// Encode to wire bytes.
    pub fn to_bytes(&self) -> [u8; REQUEST_LEN] {
        encode_request(self.command.code(), self.data)
    }

    /// Decode wire bytes, as the device does.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        check_len(bytes, REQUEST_LEN)?;
        let payload = validate(bytes)?;
        Ok(Self {
            command: Command::try_from(payload[0])?,
            data: payload[1],
        })
    }
}

/// A 3-byte response: `[echo, status, crc]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPacket {
    /// Command the device is answering
    pub command: Command,
    /// Status or result byte
    pub status: u8,
}

impl StatusPacket {
    /// Create a status packet.
    pub fn new(command: Command, status: u8) -> Self {
        Self { command, status }
    }

    /// Encode to wire bytes.
    pub fn to_bytes(&self) -> [u8; STATUS_PACKET_LEN] {
        encode_request(self.command.code(), self.status)
    }

    /// Parse a response to `command`, checking length, checksum and echo.
    pub fn parse(bytes: &[u8], command: Command) -> Result<Self, PacketError> {
        check_len(bytes, STATUS_PACKET_LEN)?;
        let payload = validate(bytes)?;
        check_echo(payload, command)?;
        Ok(Self {
            command,
            status: payload[1],
        })
    }
}

/// A 52-byte response: `[echo, board[50], crc]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardPacket {
    /// Command the device is answering
    pub command: Command,
    /// Raw tile bytes, flat-indexed
    pub board: [u8; BOARD_SIZE],
}

impl BoardPacket {
    /// Create a board packet.
    pub fn new(command: Command, board: [u8; BOARD_SIZE]) -> Self {
        Self { command, board }
    }

    /// Encode to wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BOARD_PACKET_LEN);
        out.push(self.command.code());
        out.extend_from_slice(&self.board);
        out.push(checksum(&out));
        out
    }

    /// Parse a response to `command`, checking length, checksum and echo.
    pub fn parse(bytes: &[u8], command: Command) -> Result<Self, PacketError> {
        check_len(bytes, BOARD_PACKET_LEN)?;
        let payload = validate(bytes)?;
        check_echo(payload, command)?;
        let mut board = [0u8; BOARD_SIZE];
        board.copy_from_slice(&payload[1..]);
        Ok(Self { command, board })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_board() -> [u8; BOARD_SIZE] {
        let mut board = [0u8; BOARD_SIZE];
        for (i, b) in board.iter_mut().enumerate() {
            *b = ((i % 7) as u8) << 5 | ((i % 9) as u8 + 1);
        }
        board
    }

    // ===========================================
    // Checksum Tests
    // ===========================================

    #[test]
    fn checksum_of_empty_is_zero() {
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn checksum_is_xor_fold() {
        assert_eq!(checksum(&[0x01, 0x00]), 0x01);
        assert_eq!(checksum(&[0xF0, 0x0F, 0xFF]), 0x00);
        assert_eq!(checksum(&[0x04, 0xFF]), 0xFB);
    }

    #[test]
    fn encode_request_appends_xor_for_every_pair() {
        for cmd in 0..=u8::MAX {
            for data in [0x00, 0x01, 0x31, 0x7F, 0x80, 0xFF] {
                let packet = encode_request(cmd, data);
                assert_eq!(packet[..2], [cmd, data]);
                assert_eq!(packet[2], cmd ^ data);
            }
        }
    }

    #[test]
    fn start_request_matches_known_bytes() {
        // The bytes the original bring-up script sent by hand.
        assert_eq!(Request::bare(Command::Start).to_bytes(), [0x01, 0x00, 0x01]);
    }

    // ===========================================
    // Validation Tests
    // ===========================================

    #[test]
    fn validate_strips_checksum() {
        let payload = validate(&[0x04, 0x00, 0x04]).unwrap();
        assert_eq!(payload, &[0x04, 0x00]);
    }

    #[test]
    fn validate_rejects_bad_checksum() {
        let result = validate(&[0x04, 0x00, 0x05]);
        assert_eq!(
            result,
            Err(PacketError::ChecksumMismatch {
                expected: 0x04,
                actual: 0x05
            })
        );
    }

    #[test]
    fn validate_rejects_empty() {
        assert_eq!(validate(&[]), Err(PacketError::Empty));
    }

    #[test]
    fn validate_single_zero_byte_is_empty_payload() {
        assert_eq!(validate(&[0x00]).unwrap(), &[] as &[u8]);
    }

    // ===========================================
    // Request Tests
    // ===========================================

    #[test]
    fn request_decodes_as_device_would() {
        let bytes = Request::new(Command::Match, 17).to_bytes();
        let decoded = Request::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.command, Command::Match);
        assert_eq!(decoded.data, 17);
    }

    #[test]
    fn request_decode_rejects_unknown_command() {
        let bytes = encode_request(0x09, 0x00);
        assert_eq!(
            Request::from_bytes(&bytes),
            Err(PacketError::UnknownCommand(0x09))
        );
    }

    // ===========================================
    // Response Tests
    // ===========================================

    #[test]
    fn status_packet_parses_select_reply() {
        let reply = StatusPacket::parse(&[0x04, 0x00, 0x04], Command::Select).unwrap();
        assert_eq!(reply.status, crate::sentinel::SELECT_ACCEPTED);
    }

    #[test]
    fn status_packet_rejects_wrong_echo() {
        let bytes = StatusPacket::new(Command::Match, 0x01).to_bytes();
        let result = StatusPacket::parse(&bytes, Command::Select);
        assert_eq!(
            result,
            Err(PacketError::UnexpectedEcho {
                expected: 0x04,
                actual: 0x05
            })
        );
    }

    #[test]
    fn status_packet_rejects_wrong_length() {
        let result = StatusPacket::parse(&[0x04, 0x00], Command::Select);
        assert_eq!(
            result,
            Err(PacketError::Length {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn board_packet_layout() {
        let board = sample_board();
        let bytes = BoardPacket::new(Command::Start, board).to_bytes();

        assert_eq!(bytes.len(), BOARD_PACKET_LEN);
        assert_eq!(bytes[0], 0x01);
        assert_eq!(&bytes[1..51], &board);
        assert_eq!(bytes[51], checksum(&bytes[..51]));
    }

    #[test]
    fn board_packet_parse_returns_board() {
        let board = sample_board();
        let bytes = BoardPacket::new(Command::Shuffle, board).to_bytes();
        let parsed = BoardPacket::parse(&bytes, Command::Shuffle).unwrap();
        assert_eq!(parsed.board, board);
    }

    #[test]
    fn board_packet_detects_corruption() {
        let mut bytes = BoardPacket::new(Command::Start, sample_board()).to_bytes();
        bytes[10] ^= 0x20;
        let result = BoardPacket::parse(&bytes, Command::Start);
        assert!(matches!(result, Err(PacketError::ChecksumMismatch { .. })));
    }
}
