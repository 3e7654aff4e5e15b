//! Command codes understood by the device firmware.

use serde::{Deserialize, Serialize};

use crate::PacketError;

/// Command discriminator carried in the first byte of every request
/// and echoed in the first byte of every response.
///
/// Values are fixed by the firmware and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Command {
    /// Generate a new board
    Start = 0x01,
    /// Reset the device-side game
    Reset = 0x02,
    /// Reshuffle the remaining tiles
    Shuffle = 0x03,
    /// Select the first tile of a pair
    Select = 0x04,
    /// Try to match the selected tile with a second one
    Match = 0x05,
    /// Re-read the current board
    GetState = 0x06,
    /// Abandon the current game
    GiveUp = 0x07,
}

impl Command {
    /// Every command, in wire order.
    pub const ALL: [Command; 7] = [
        Command::Start,
        Command::Reset,
        Command::Shuffle,
        Command::Select,
        Command::Match,
        Command::GetState,
        Command::GiveUp,
    ];

    /// The wire byte for this command.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether the request's data byte carries a tile address.
    pub const fn takes_tile(self) -> bool {
        matches!(self, Command::Select | Command::Match)
    }
}

impl TryFrom<u8> for Command {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Command::Start),
            0x02 => Ok(Command::Reset),
            0x03 => Ok(Command::Shuffle),
            0x04 => Ok(Command::Select),
            0x05 => Ok(Command::Match),
            0x06 => Ok(Command::GetState),
            0x07 => Ok(Command::GiveUp),
            _ => Err(PacketError::UnknownCommand(value)),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Start => "START",
            Command::Reset => "RESET",
            Command::Shuffle => "SHUFFLE",
            Command::Select => "SELECT",
            Command::Match => "MATCH",
            Command::GetState => "GET_STATE",
            Command::GiveUp => "GIVE_UP",
        };
        f.write_str(name)
    }
}

/// Reserved status bytes.
///
/// Each sentinel is only meaningful for the command it is named after:
/// `0xFF` means "limit reached" in a SHUFFLE header but "refused" in a
/// SELECT reply, so callers compare against the constant for their own
/// command and never against a global value.
pub mod sentinel {
    /// Data byte sent with commands that carry no argument.
    pub const UNUSED_DATA: u8 = 0x00;

    /// SHUFFLE header status: shuffle count exhausted, no board follows.
    pub const SHUFFLE_LIMIT_REACHED: u8 = 0xFF;

    /// SELECT status: tile accepted as the first of a pair.
    pub const SELECT_ACCEPTED: u8 = 0x00;

    /// MATCH result: both tiles removed on the device.
    pub const MATCH_SUCCESS: u8 = 0x01;
}
