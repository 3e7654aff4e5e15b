//! Command exchange protocol.
//!
//! Every exchange is the same three steps: flush stale input, write the
//! 3-byte request, then read exactly the reply the command defines.
//!
//! | Command   | Reply                                  |
//! |-----------|----------------------------------------|
//! | START     | 52 bytes: echo, board, checksum        |
//! | GET_STATE | 52 bytes: echo, board, checksum        |
//! | RESET     | 3 bytes: ack                           |
//! | GIVE_UP   | 3 bytes: ack                           |
//! | SELECT    | 3 bytes: echo, status, checksum        |
//! | MATCH     | 3 bytes: echo, result, checksum        |
//! | SHUFFLE   | 3-byte header, then 49 more unless the |
//! |           | header status is the limit sentinel    |
//!
//! Nothing here retries. A failed exchange is returned as an
//! [`ExchangeError`] and the caller decides what it means for the session.

use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use pyramid_types::{
    sentinel, Addressing, BoardPacket, Command, PacketError, Request, StatusPacket,
    BOARD_PACKET_LEN, BOARD_SIZE, STATUS_PACKET_LEN,
};

use crate::transport::{Link, LinkError};

/// A failed exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Link failure.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Reply arrived but is malformed.
    #[error(transparent)]
    Packet(#[from] PacketError),
}

impl ExchangeError {
    /// Whether the failure means the device is gone, as opposed to a live
    /// link that delivered bad data.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            ExchangeError::Link(LinkError::Timeout | LinkError::NotOpen | LinkError::Io(_))
        )
    }
}

/// Result of a SHUFFLE exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShuffleReply {
    /// The device reshuffled the remaining tiles.
    Board([u8; BOARD_SIZE]),
    /// The device has no shuffles left; only the 3-byte header was read.
    LimitReached,
}

/// Request/response rules for one session.
#[derive(Debug, Clone, Copy)]
pub struct Protocol {
    read_timeout: Duration,
    addressing: Addressing,
}

impl Protocol {
    /// Create a protocol with the given per-read timeout and tile addressing.
    pub fn new(read_timeout: Duration, addressing: Addressing) -> Self {
        Self {
            read_timeout,
            addressing,
        }
    }

    /// Tile addressing used for SELECT and MATCH.
    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    async fn send<L: Link + ?Sized>(&self, link: &L, request: Request) -> Result<(), ExchangeError> {
        link.flush_input().await?;
        debug!("-> {} data={:#04x}", request.command, request.data);
        link.write_all(&request.to_bytes()).await?;
        Ok(())
    }

    async fn read<L: Link + ?Sized>(&self, link: &L, count: usize) -> Result<Vec<u8>, LinkError> {
        link.read_exact(count, self.read_timeout).await
    }

    async fn status<L: Link + ?Sized>(
        &self,
        link: &L,
        request: Request,
    ) -> Result<StatusPacket, ExchangeError> {
        self.send(link, request).await?;
        let reply = self.read(link, STATUS_PACKET_LEN).await?;
        let packet = StatusPacket::parse(&reply, request.command)?;
        debug!("<- {} status={:#04x}", packet.command, packet.status);
        Ok(packet)
    }

    async fn board<L: Link + ?Sized>(
        &self,
        link: &L,
        command: Command,
    ) -> Result<[u8; BOARD_SIZE], ExchangeError> {
        self.send(link, Request::bare(command)).await?;
        let reply = self.read(link, BOARD_PACKET_LEN).await?;
        let packet = BoardPacket::parse(&reply, command)?;
        debug!("<- {} board", packet.command);
        Ok(packet.board)
    }

    /// START: deal a new board.
    pub async fn start<L: Link + ?Sized>(&self, link: &L) -> Result<[u8; BOARD_SIZE], ExchangeError> {
        self.board(link, Command::Start).await
    }

    /// GET_STATE: read the device's current board without changing it.
    pub async fn get_state<L: Link + ?Sized>(
        &self,
        link: &L,
    ) -> Result<[u8; BOARD_SIZE], ExchangeError> {
        self.board(link, Command::GetState).await
    }

    /// RESET: restart the game on the device.
    pub async fn reset<L: Link + ?Sized>(&self, link: &L) -> Result<(), ExchangeError> {
        self.status(link, Request::bare(Command::Reset)).await?;
        Ok(())
    }

    /// GIVE_UP: abandon the current game.
    pub async fn give_up<L: Link + ?Sized>(&self, link: &L) -> Result<(), ExchangeError> {
        self.status(link, Request::bare(Command::GiveUp)).await?;
        Ok(())
    }

    /// SHUFFLE: two-stage read.
    ///
    /// The 3-byte header is read first. A limit sentinel in its status byte
    /// ends the exchange (the header is then a complete status packet).
    /// Otherwise the header is the start of a board packet and exactly
    /// `BOARD_PACKET_LEN - 3` further bytes are read before the whole
    /// packet's checksum is checked.
    pub async fn shuffle<L: Link + ?Sized>(&self, link: &L) -> Result<ShuffleReply, ExchangeError> {
        self.send(link, Request::bare(Command::Shuffle)).await?;

        let header = self.read(link, STATUS_PACKET_LEN).await?;
        if header[1] == sentinel::SHUFFLE_LIMIT_REACHED {
            StatusPacket::parse(&header, Command::Shuffle)?;
            debug!("<- SHUFFLE limit reached");
            return Ok(ShuffleReply::LimitReached);
        }

        let rest = self.read(link, BOARD_PACKET_LEN - STATUS_PACKET_LEN).await?;
        let mut packet = header;
        packet.extend_from_slice(&rest);
        let packet = BoardPacket::parse(&packet, Command::Shuffle)?;
        debug!("<- SHUFFLE board");
        Ok(ShuffleReply::Board(packet.board))
    }

    /// SELECT: returns whether the device accepted the selection.
    pub async fn select<L: Link + ?Sized>(&self, link: &L, index: usize) -> Result<bool, ExchangeError> {
        let data = self.addressing.encode(index)?;
        let reply = self.status(link, Request::new(Command::Select, data)).await?;
        Ok(reply.status == sentinel::SELECT_ACCEPTED)
    }

    /// MATCH: returns whether the device removed the pair.
    pub async fn match_tile<L: Link + ?Sized>(
        &self,
        link: &L,
        index: usize,
    ) -> Result<bool, ExchangeError> {
        let data = self.addressing.encode(index)?;
        let reply = self.status(link, Request::new(Command::Match, data)).await?;
        Ok(reply.status == sentinel::MATCH_SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockLink;
    use pyramid_types::{checksum, CoordByte};

    const PORT: &str = "/dev/ttyACM0";

    fn protocol() -> Protocol {
        Protocol::new(Duration::from_millis(20), Addressing::Flat)
    }

    async fn open_link() -> MockLink {
        let link = MockLink::with_endpoint(PORT);
        link.open(PORT, 115_200).await.unwrap();
        link
    }

    fn sample_board() -> [u8; BOARD_SIZE] {
        std::array::from_fn(|i| ((i % 7) as u8) << 5 | ((i % 9) as u8 + 1))
    }

    // ===========================================
    // Board Reply Tests
    // ===========================================

    #[tokio::test]
    async fn start_writes_request_and_reads_52_bytes() {
        let link = open_link().await;
        let board = sample_board();
        link.queue_reply(BoardPacket::new(Command::Start, board).to_bytes());

        let got = protocol().start(&link).await.unwrap();

        assert_eq!(got, board);
        assert_eq!(link.written(), vec![vec![0x01, 0x00, 0x01]]);
        assert_eq!(link.reads(), vec![BOARD_PACKET_LEN]);
    }

    #[tokio::test]
    async fn get_state_reads_board() {
        let link = open_link().await;
        let board = sample_board();
        link.queue_reply(BoardPacket::new(Command::GetState, board).to_bytes());

        assert_eq!(protocol().get_state(&link).await.unwrap(), board);
        assert_eq!(link.last_written(), Some(vec![0x06, 0x00, 0x06]));
    }

    #[tokio::test]
    async fn corrupt_board_is_protocol_error() {
        let link = open_link().await;
        let mut reply = BoardPacket::new(Command::Start, sample_board()).to_bytes();
        reply[20] ^= 0x01;
        link.queue_reply(reply);

        let err = protocol().start(&link).await.unwrap_err();

        assert!(matches!(
            err,
            ExchangeError::Packet(PacketError::ChecksumMismatch { .. })
        ));
        assert!(!err.is_disconnect());
    }

    #[tokio::test]
    async fn wrong_echo_is_protocol_error() {
        let link = open_link().await;
        link.queue_reply(BoardPacket::new(Command::GetState, sample_board()).to_bytes());

        let err = protocol().start(&link).await.unwrap_err();

        assert!(matches!(
            err,
            ExchangeError::Packet(PacketError::UnexpectedEcho {
                expected: 0x01,
                actual: 0x06
            })
        ));
        assert!(!err.is_disconnect());
    }

    #[tokio::test]
    async fn stale_input_is_flushed_before_request() {
        let link = open_link().await;
        link.inject_stale(&[0x05, 0x01, 0x04]);
        link.queue_reply(StatusPacket::new(Command::Reset, 0x00).to_bytes().to_vec());

        protocol().reset(&link).await.unwrap();

        assert_eq!(link.flushes(), 1);
    }

    // ===========================================
    // Shuffle Tests
    // ===========================================

    #[tokio::test]
    async fn shuffle_limit_reads_only_header() {
        let link = open_link().await;
        link.queue_reply(vec![0x03, 0xFF, 0x03 ^ 0xFF]);

        let reply = protocol().shuffle(&link).await.unwrap();

        assert_eq!(reply, ShuffleReply::LimitReached);
        assert_eq!(link.reads(), vec![3]);
    }

    #[tokio::test]
    async fn shuffle_limit_with_bad_checksum_is_protocol_error() {
        let link = open_link().await;
        link.queue_reply(vec![0x03, 0xFF, 0x00]);

        let err = protocol().shuffle(&link).await.unwrap_err();

        assert!(matches!(
            err,
            ExchangeError::Packet(PacketError::ChecksumMismatch { .. })
        ));
        assert_eq!(link.reads(), vec![3]);
    }

    #[tokio::test]
    async fn shuffle_success_reads_exactly_49_more() {
        let link = open_link().await;
        let board = sample_board();
        link.queue_reply(BoardPacket::new(Command::Shuffle, board).to_bytes());

        let reply = protocol().shuffle(&link).await.unwrap();

        assert_eq!(reply, ShuffleReply::Board(board));
        assert_eq!(link.reads(), vec![3, 49]);
    }

    #[tokio::test]
    async fn shuffle_board_checksum_covers_whole_packet() {
        let link = open_link().await;
        let mut reply = BoardPacket::new(Command::Shuffle, sample_board()).to_bytes();
        // Corrupt a byte in the header's status position
        reply[1] ^= 0x02;
        link.queue_reply(reply);

        let err = protocol().shuffle(&link).await.unwrap_err();

        assert!(matches!(
            err,
            ExchangeError::Packet(PacketError::ChecksumMismatch { .. })
        ));
        assert_eq!(link.reads(), vec![3, 49]);
    }

    #[tokio::test]
    async fn shuffle_truncated_board_is_short_read() {
        let link = open_link().await;
        let mut reply = BoardPacket::new(Command::Shuffle, sample_board()).to_bytes();
        reply.truncate(30);
        link.queue_reply(reply);

        let err = protocol().shuffle(&link).await.unwrap_err();

        assert!(matches!(
            err,
            ExchangeError::Link(LinkError::ShortRead {
                expected: 49,
                received: 27
            })
        ));
        assert!(!err.is_disconnect());
    }

    // ===========================================
    // Select / Match Tests
    // ===========================================

    #[tokio::test]
    async fn select_accepted_on_zero_status() {
        let link = open_link().await;
        link.queue_reply(StatusPacket::new(Command::Select, 0x00).to_bytes().to_vec());

        assert!(protocol().select(&link, 7).await.unwrap());
        assert_eq!(link.last_written(), Some(vec![0x04, 7, 0x04 ^ 7]));
    }

    #[tokio::test]
    async fn select_refused_on_error_status() {
        let link = open_link().await;
        link.queue_reply(StatusPacket::new(Command::Select, 0xFF).to_bytes().to_vec());

        assert!(!protocol().select(&link, 7).await.unwrap());
    }

    #[tokio::test]
    async fn match_success_sentinel() {
        let link = open_link().await;
        link.queue_reply(StatusPacket::new(Command::Match, 0x01).to_bytes().to_vec());
        link.queue_reply(StatusPacket::new(Command::Match, 0x00).to_bytes().to_vec());

        assert!(protocol().match_tile(&link, 12).await.unwrap());
        assert!(!protocol().match_tile(&link, 13).await.unwrap());
    }

    #[tokio::test]
    async fn coordinate_addressing_changes_data_byte() {
        let link = open_link().await;
        link.queue_reply(StatusPacket::new(Command::Select, 0x00).to_bytes().to_vec());
        let proto = Protocol::new(Duration::from_millis(20), Addressing::Coordinate);

        proto.select(&link, 30).await.unwrap();

        let data = CoordByte::pack(1, 1, 1).0;
        let request = link.last_written().unwrap();
        assert_eq!(request[1], data);
        assert_eq!(request[2], checksum(&request[..2]));
    }

    #[tokio::test]
    async fn out_of_range_index_writes_nothing() {
        let link = open_link().await;

        let err = protocol().select(&link, 50).await.unwrap_err();

        assert!(matches!(
            err,
            ExchangeError::Packet(PacketError::IndexOutOfRange(50))
        ));
        assert!(link.written().is_empty());
    }

    // ===========================================
    // Disconnect Classification Tests
    // ===========================================

    #[tokio::test]
    async fn silence_is_disconnect() {
        let link = open_link().await;
        link.set_silent(true);

        let err = protocol().give_up(&link).await.unwrap_err();

        assert!(matches!(err, ExchangeError::Link(LinkError::Timeout)));
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn write_failure_is_disconnect() {
        let link = open_link().await;
        link.fail_next_write("unplugged");

        let err = protocol().start(&link).await.unwrap_err();
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn closed_link_is_disconnect() {
        let link = MockLink::with_endpoint(PORT);
        let err = protocol().reset(&link).await.unwrap_err();
        assert!(err.is_disconnect());
    }
}
