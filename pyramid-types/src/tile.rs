//! Tile byte decoding.
//!
//! ```text
//!   7   6   5   4   3   2   1   0
//! ┌───────────┬───────────────────┐
//! │  group    │       value       │
//! └───────────┴───────────────────┘
//! ```
//!
//! A byte of `0x00` is an empty (removed) cell, never a tile.

use serde::{Deserialize, Serialize};

const GROUP_SHIFT: u8 = 5;
const GROUP_MASK: u8 = 0x07;
const VALUE_MASK: u8 = 0x1F;

/// Suit of a tile, bits 5-7 of the tile byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileGroup {
    /// Group 0
    Bamboo,
    /// Group 1
    Chars,
    /// Group 2
    Circles,
    /// Group 3
    Winds,
    /// Group 4
    Dragons,
    /// Group 5 (any two flowers match)
    Flowers,
    /// Group 6 (any two seasons match)
    Seasons,
    /// Group id the firmware never assigns
    Unknown(u8),
}

impl TileGroup {
    /// Decode a 3-bit group id.
    pub fn from_id(id: u8) -> Self {
        match id & GROUP_MASK {
            0 => TileGroup::Bamboo,
            1 => TileGroup::Chars,
            2 => TileGroup::Circles,
            3 => TileGroup::Winds,
            4 => TileGroup::Dragons,
            5 => TileGroup::Flowers,
            6 => TileGroup::Seasons,
            other => TileGroup::Unknown(other),
        }
    }

    /// The 3-bit group id.
    pub fn id(self) -> u8 {
        match self {
            TileGroup::Bamboo => 0,
            TileGroup::Chars => 1,
            TileGroup::Circles => 2,
            TileGroup::Winds => 3,
            TileGroup::Dragons => 4,
            TileGroup::Flowers => 5,
            TileGroup::Seasons => 6,
            TileGroup::Unknown(id) => id & GROUP_MASK,
        }
    }

    /// Human-readable group name.
    pub fn name(self) -> &'static str {
        match self {
            TileGroup::Bamboo => "Bamboo",
            TileGroup::Chars => "Chars",
            TileGroup::Circles => "Circles",
            TileGroup::Winds => "Winds",
            TileGroup::Dragons => "Dragons",
            TileGroup::Flowers => "Flowers",
            TileGroup::Seasons => "Seasons",
            TileGroup::Unknown(_) => "Unknown",
        }
    }

    /// Whether any two tiles of this group pair regardless of face value.
    pub fn is_wildcard(self) -> bool {
        matches!(self, TileGroup::Flowers | TileGroup::Seasons)
    }
}

/// A decoded board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tile {
    /// Removed or never-filled cell (`0x00`)
    Empty,
    /// A tile still on the board
    Face {
        /// Suit
        group: TileGroup,
        /// Face value, 0-31
        value: u8,
    },
}

impl Tile {
    /// Decode a tile byte.
    pub fn from_byte(byte: u8) -> Self {
        if byte == 0 {
            return Tile::Empty;
        }
        Tile::Face {
            group: TileGroup::from_id(byte >> GROUP_SHIFT),
            value: byte & VALUE_MASK,
        }
    }

    /// Encode back to the wire byte.
    pub fn to_byte(self) -> u8 {
        match self {
            Tile::Empty => 0,
            Tile::Face { group, value } => (group.id() << GROUP_SHIFT) | (value & VALUE_MASK),
        }
    }

    /// Whether the cell is empty.
    pub fn is_empty(self) -> bool {
        matches!(self, Tile::Empty)
    }

    /// Whether two tiles form a pair under the firmware's rule: same group,
    /// and either the same value or a Flowers/Seasons group.
    pub fn pairs_with(self, other: Tile) -> bool {
        match (self, other) {
            (
                Tile::Face {
                    group: g1,
                    value: v1,
                },
                Tile::Face {
                    group: g2,
                    value: v2,
                },
            ) => g1 == g2 && (g1.is_wildcard() || v1 == v2),
            _ => false,
        }
    }
}

impl From<u8> for Tile {
    fn from(byte: u8) -> Self {
        Tile::from_byte(byte)
    }
}

impl std::fmt::Display for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tile::Empty => f.write_str("--"),
            Tile::Face { group, value } => write!(f, "{} {}", group.name(), value),
        }
    }
}
