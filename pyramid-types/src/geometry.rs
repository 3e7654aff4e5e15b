//! Pyramid geometry.
//!
//! The board is a flat array of 50 cells split into three stacked square
//! layers without gaps:
//!
//! ```text
//! flat index   layer    side
//!  0 ..= 24    Bottom   5x5
//! 25 ..= 40    Middle   4x4
//! 41 ..= 49    Top      3x3
//! ```
//!
//! Within a layer, `(row, col) = divmod(local_index, side)`. Each upper
//! layer sits half a tile in from the one below, so an upper cell at
//! `(r, c)` rests on the four lower cells `(r..=r+1, c..=c+1)`.

use serde::{Deserialize, Serialize};

use crate::PacketError;

/// Number of cells on the board.
pub const BOARD_SIZE: usize = 50;

/// One of the three square layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    /// 5x5, flat indices 0..25
    Bottom,
    /// 4x4, flat indices 25..41
    Middle,
    /// 3x3, flat indices 41..50
    Top,
}

impl Layer {
    /// All layers, bottom first.
    pub const ALL: [Layer; 3] = [Layer::Bottom, Layer::Middle, Layer::Top];

    /// Side length of the square.
    pub const fn side(self) -> usize {
        match self {
            Layer::Bottom => 5,
            Layer::Middle => 4,
            Layer::Top => 3,
        }
    }

    /// First flat index of the layer.
    pub const fn start(self) -> usize {
        match self {
            Layer::Bottom => 0,
            Layer::Middle => 25,
            Layer::Top => 41,
        }
    }

    /// Number of cells in the layer.
    pub const fn cell_count(self) -> usize {
        self.side() * self.side()
    }

    /// Flat index range of the layer.
    pub const fn range(self) -> std::ops::Range<usize> {
        self.start()..self.start() + self.cell_count()
    }

    /// Height in the stack, 0 for the bottom layer.
    pub const fn z(self) -> u8 {
        match self {
            Layer::Bottom => 0,
            Layer::Middle => 1,
            Layer::Top => 2,
        }
    }

    /// Layer at height `z`.
    pub fn from_z(z: u8) -> Option<Self> {
        match z {
            0 => Some(Layer::Bottom),
            1 => Some(Layer::Middle),
            2 => Some(Layer::Top),
            _ => None,
        }
    }

    /// Layer directly above, if any.
    pub fn above(self) -> Option<Self> {
        Layer::from_z(self.z() + 1)
    }

    /// Layer containing a flat index.
    pub fn of(index: usize) -> Result<Self, PacketError> {
        Layer::ALL
            .into_iter()
            .find(|layer| layer.range().contains(&index))
            .ok_or(PacketError::IndexOutOfRange(index))
    }
}

/// A cell addressed by layer, row and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Layer
    pub layer: Layer,
    /// Row within the layer
    pub row: usize,
    /// Column within the layer
    pub col: usize,
}

impl Position {
    /// Create a position, checking it lies inside its layer.
    pub fn new(layer: Layer, row: usize, col: usize) -> Option<Self> {
        (row < layer.side() && col < layer.side()).then_some(Self { layer, row, col })
    }

    /// Position of a flat index.
    pub fn from_index(index: usize) -> Result<Self, PacketError> {
        let layer = Layer::of(index)?;
        let local = index - layer.start();
        Ok(Self {
            layer,
            row: local / layer.side(),
            col: local % layer.side(),
        })
    }

    /// Flat index of this position.
    pub fn to_index(self) -> usize {
        self.layer.start() + self.row * self.layer.side() + self.col
    }

    /// Cells in the layer above that rest on this one.
    pub fn covering(self) -> Vec<Position> {
        let Some(upper) = self.layer.above() else {
            return Vec::new();
        };
        let mut cells = Vec::with_capacity(4);
        for row in self.row.saturating_sub(1)..=self.row {
            for col in self.col.saturating_sub(1)..=self.col {
                if let Some(pos) = Position::new(upper, row, col) {
                    cells.push(pos);
                }
            }
        }
        cells
    }
}

/// A coordinate-encoded address byte: `(y & 7) | (x & 7) << 3 | (z & 3) << 6`,
/// with `x` the column, `y` the row and `z` the layer height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordByte(pub u8);

impl CoordByte {
    /// Pack raw coordinates.
    pub fn pack(x: u8, y: u8, z: u8) -> Self {
        Self((y & 0x7) | ((x & 0x7) << 3) | ((z & 0x3) << 6))
    }

    /// Encode a board position.
    pub fn from_position(pos: Position) -> Self {
        Self::pack(pos.col as u8, pos.row as u8, pos.layer.z())
    }

    /// Column.
    pub fn x(self) -> u8 {
        (self.0 >> 3) & 0x7
    }

    /// Row.
    pub fn y(self) -> u8 {
        self.0 & 0x7
    }

    /// Layer height.
    pub fn z(self) -> u8 {
        (self.0 >> 6) & 0x3
    }

    /// Decode to a board position, if the coordinates lie on the board.
    pub fn to_position(self) -> Option<Position> {
        let layer = Layer::from_z(self.z())?;
        Position::new(layer, self.y() as usize, self.x() as usize)
    }
}

/// How SELECT/MATCH requests address a tile.
///
/// The firmware build decides which one it expects; a session uses exactly
/// one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Addressing {
    /// Data byte is the flat index 0..50
    #[default]
    Flat,
    /// Data byte is a [`CoordByte`]
    Coordinate,
}

impl Addressing {
    /// Encode a flat index as the request data byte.
    pub fn encode(self, index: usize) -> Result<u8, PacketError> {
        let pos = Position::from_index(index)?;
        Ok(match self {
            Addressing::Flat => index as u8,
            Addressing::Coordinate => CoordByte::from_position(pos).0,
        })
    }

    /// Decode a request data byte back to a flat index.
    pub fn decode(self, byte: u8) -> Result<usize, PacketError> {
        match self {
            Addressing::Flat => {
                let index = byte as usize;
                Layer::of(index).map(|_| index)
            }
            Addressing::Coordinate => CoordByte(byte)
                .to_position()
                .map(Position::to_index)
                .ok_or(PacketError::IndexOutOfRange(byte as usize)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===========================================
    // Layer Tests
    // ===========================================

    #[test]
    fn layers_partition_board_without_gaps() {
        assert_eq!(Layer::Bottom.range(), 0..25);
        assert_eq!(Layer::Middle.range(), 25..41);
        assert_eq!(Layer::Top.range(), 41..50);
        let total: usize = Layer::ALL.iter().map(|l| l.cell_count()).sum();
        assert_eq!(total, BOARD_SIZE);
    }

    #[test]
    fn layer_of_boundaries() {
        assert_eq!(Layer::of(0).unwrap(), Layer::Bottom);
        assert_eq!(Layer::of(24).unwrap(), Layer::Bottom);
        assert_eq!(Layer::of(25).unwrap(), Layer::Middle);
        assert_eq!(Layer::of(40).unwrap(), Layer::Middle);
        assert_eq!(Layer::of(41).unwrap(), Layer::Top);
        assert_eq!(Layer::of(49).unwrap(), Layer::Top);
        assert_eq!(Layer::of(50), Err(PacketError::IndexOutOfRange(50)));
    }

    // ===========================================
    // Position Tests
    // ===========================================

    #[test]
    fn position_uses_divmod_within_layer() {
        let pos = Position::from_index(7).unwrap();
        assert_eq!((pos.layer, pos.row, pos.col), (Layer::Bottom, 1, 2));

        let pos = Position::from_index(30).unwrap();
        assert_eq!((pos.layer, pos.row, pos.col), (Layer::Middle, 1, 1));

        let pos = Position::from_index(49).unwrap();
        assert_eq!((pos.layer, pos.row, pos.col), (Layer::Top, 2, 2));
    }

    #[test]
    fn every_index_maps_back() {
        for index in 0..BOARD_SIZE {
            assert_eq!(Position::from_index(index).unwrap().to_index(), index);
        }
    }

    #[test]
    fn bottom_corner_is_covered_by_one_cell() {
        let pos = Position::from_index(0).unwrap();
        assert_eq!(pos.covering(), vec![Position::new(Layer::Middle, 0, 0).unwrap()]);
    }

    #[test]
    fn bottom_centre_is_covered_by_four_cells() {
        // Bottom (2, 2) sits under middle (1..=2, 1..=2).
        let pos = Position::new(Layer::Bottom, 2, 2).unwrap();
        let covering: Vec<usize> = pos.covering().into_iter().map(Position::to_index).collect();
        assert_eq!(covering, vec![30, 31, 34, 35]);
    }

    #[test]
    fn top_layer_is_never_covered() {
        for index in Layer::Top.range() {
            assert!(Position::from_index(index).unwrap().covering().is_empty());
        }
    }

    // ===========================================
    // Coordinate Byte Tests
    // ===========================================

    #[test]
    fn coord_byte_packing() {
        // x=2 y=1 z=1 -> 0b01_010_001
        assert_eq!(CoordByte::pack(2, 1, 1).0, 0b0101_0001);
        let c = CoordByte(0b0101_0001);
        assert_eq!((c.x(), c.y(), c.z()), (2, 1, 1));
    }

    #[test]
    fn coord_byte_masks_out_of_range_parts() {
        assert_eq!(CoordByte::pack(0xFF, 0, 0).0, 0b0011_1000);
        assert_eq!(CoordByte::pack(0, 0, 0xFF).0, 0b1100_0000);
    }

    #[test]
    fn coord_byte_outside_board_has_no_position() {
        // z=3 does not exist
        assert!(CoordByte::pack(0, 0, 3).to_position().is_none());
        // top layer is only 3 wide
        assert!(CoordByte::pack(3, 0, 2).to_position().is_none());
    }

    // ===========================================
    // Addressing Tests
    // ===========================================

    #[test]
    fn flat_addressing_is_the_index() {
        assert_eq!(Addressing::Flat.encode(42).unwrap(), 42);
        assert_eq!(Addressing::Flat.decode(42).unwrap(), 42);
    }

    #[test]
    fn coordinate_addressing_encodes_position() {
        // index 30 = middle (row 1, col 1) -> x=1 y=1 z=1
        assert_eq!(
            Addressing::Coordinate.encode(30).unwrap(),
            CoordByte::pack(1, 1, 1).0
        );
    }

    #[test]
    fn both_conventions_decode_what_they_encode() {
        for mode in [Addressing::Flat, Addressing::Coordinate] {
            for index in 0..BOARD_SIZE {
                let byte = mode.encode(index).unwrap();
                assert_eq!(mode.decode(byte).unwrap(), index, "{mode:?} {index}");
            }
        }
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        assert_eq!(
            Addressing::Flat.encode(50),
            Err(PacketError::IndexOutOfRange(50))
        );
        assert_eq!(
            Addressing::Coordinate.encode(99),
            Err(PacketError::IndexOutOfRange(99))
        );
    }

    #[test]
    fn addressing_parses_from_lowercase() {
        let mode: Addressing = serde_json::from_str("\"coordinate\"").unwrap();
        assert_eq!(mode, Addressing::Coordinate);
        assert_eq!(Addressing::default(), Addressing::Flat);
    }
}
