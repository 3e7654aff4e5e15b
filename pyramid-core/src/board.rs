//! The client's copy of the 50-cell pyramid.
//!
//! Tile bytes are decoded once, when a board arrives from the device, and
//! the rest of the client works with [`Tile`] values. The only mutation is
//! [`Board::remove`], used to mirror a removal the device has already
//! confirmed.

use pyramid_types::{Layer, Position, Tile, BOARD_SIZE};

/// A decoded pyramid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    tiles: [Tile; BOARD_SIZE],
}

impl Board {
    /// Decode a board from its 50 wire bytes.
    pub fn from_bytes(bytes: &[u8; BOARD_SIZE]) -> Self {
        Self {
            tiles: bytes.map(Tile::from_byte),
        }
    }

    /// Encode back to wire bytes (the presentation snapshot).
    pub fn to_bytes(&self) -> [u8; BOARD_SIZE] {
        self.tiles.map(Tile::to_byte)
    }

    /// Tile at a flat index, `None` when out of range.
    pub fn get(&self, index: usize) -> Option<Tile> {
        self.tiles.get(index).copied()
    }

    /// Whether the cell holds a tile.
    pub fn is_occupied(&self, index: usize) -> bool {
        self.get(index).is_some_and(|t| !t.is_empty())
    }

    /// Empty a cell.
    pub fn remove(&mut self, index: usize) {
        if let Some(tile) = self.tiles.get_mut(index) {
            *tile = Tile::Empty;
        }
    }

    /// Number of tiles still on the board.
    pub fn remaining(&self) -> usize {
        self.tiles.iter().filter(|t| !t.is_empty()).count()
    }

    /// Whether every tile has been removed.
    pub fn is_cleared(&self) -> bool {
        self.remaining() == 0
    }

    /// Iterate `(flat index, tile)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Tile)> + '_ {
        self.tiles.iter().copied().enumerate()
    }

    /// Iterate the tiles of one layer with their positions.
    pub fn layer(&self, layer: Layer) -> impl Iterator<Item = (Position, Tile)> + '_ {
        layer.range().filter_map(move |index| {
            let pos = Position::from_index(index).ok()?;
            Some((pos, self.tiles[index]))
        })
    }

    /// Whether a tile is present and nothing rests on top of it.
    pub fn is_free(&self, index: usize) -> bool {
        if !self.is_occupied(index) {
            return false;
        }
        let Ok(pos) = Position::from_index(index) else {
            return false;
        };
        pos.covering()
            .into_iter()
            .all(|above| !self.is_occupied(above.to_index()))
    }

    /// First pair of free tiles that would match, in flat-index order.
    pub fn hint(&self) -> Option<(usize, usize)> {
        let free: Vec<(usize, Tile)> = self.iter().filter(|(i, _)| self.is_free(*i)).collect();
        for (n, (i, a)) in free.iter().enumerate() {
            if let Some((j, _)) = free[n + 1..].iter().find(|(_, b)| a.pairs_with(*b)) {
                return Some((*i, *j));
            }
        }
        None
    }
}
