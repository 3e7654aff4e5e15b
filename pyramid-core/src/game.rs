//! Board state model: the board plus the two-phase select/match interaction.
//!
//! ```text
//!             click(i), no selection
//!   Idle ───────────────────────────────► SELECT(i) ──accepted──► Selected(i)
//!    ▲                                                                │
//!    │   click(i) again (local only)                                  │
//!    ├────────────────────────────────────────────────────────────────┤
//!    │                                                                │
//!    │   MATCH(j) confirmed: cells i and j emptied                    │ click(j)
//!    ├───────────────────────────────────────────────────── MATCH(j) ◄┘
//!    │   MATCH(j) refused: board untouched, (i, j) highlighted
//!    └──────────────────────────────────────────────────────
//! ```
//!
//! The device owns the authoritative board. The only local mutation is the
//! removal of a pair the device has just confirmed, which is what the device
//! itself committed.

use pyramid_types::BOARD_SIZE;
use serde::Serialize;
use thiserror::Error;

use crate::Board;

/// Reasons a move is refused before anything is sent to the device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// No board has been received yet
    #[error("no board loaded")]
    NoBoard,

    /// The board may no longer match the device; a fresh START is needed
    #[error("board is stale, start a new game")]
    StaleBoard,

    /// Index outside 0..50
    #[error("board index out of range: {0}")]
    IndexOutOfRange(usize),

    /// The clicked cell has no tile
    #[error("cell {0} is empty")]
    EmptyCell(usize),

    /// SELECT while a tile is already selected
    #[error("tile {0} is already selected")]
    AlreadySelected(usize),

    /// MATCH with nothing selected
    #[error("no tile selected")]
    NothingSelected,
}

/// What a click on a cell should turn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Click {
    /// Send SELECT for this index
    Select(usize),
    /// Send MATCH for `second`, pairing it with the selected `first`
    Match {
        /// Currently selected index
        first: usize,
        /// Newly clicked index
        second: usize,
    },
    /// Clicked the selected tile again: clear selection, nothing sent
    Deselect(usize),
}

/// Result of a MATCH exchange applied to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Both cells were emptied
    Removed {
        /// Previously selected index
        first: usize,
        /// Matched index
        second: usize,
    },
    /// The device refused; both indices are reported for highlighting
    Rejected {
        /// Previously selected index
        first: usize,
        /// Clicked index
        second: usize,
    },
}

/// Read-only snapshot handed to presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardView {
    /// The 50 tile bytes, `0x00` for empty cells
    pub tiles: Vec<u8>,
    /// Selected index, if any
    pub selected: Option<usize>,
    /// Indices to flash as rejected
    pub highlighted: Vec<usize>,
    /// Tiles still on the board
    pub remaining: usize,
}

/// Board plus selection.
#[derive(Debug, Clone, Default)]
pub struct GameState {
    board: Option<Board>,
    stale: bool,
    selected: Option<usize>,
    rejected: Option<(usize, usize)>,
}

impl GameState {
    /// Create an empty model with no board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the board wholesale and clear selection.
    pub fn apply_board(&mut self, bytes: &[u8; BOARD_SIZE]) -> BoardView {
        let board = Board::from_bytes(bytes);
        self.stale = false;
        self.selected = None;
        self.rejected = None;
        let view = self.snapshot(&board);
        self.board = Some(board);
        view
    }

    /// Drop the board entirely (game abandoned).
    pub fn clear_board(&mut self) {
        self.board = None;
        self.stale = false;
        self.selected = None;
        self.rejected = None;
    }

    /// Mark the board as possibly diverged from the device.
    ///
    /// Selection is cleared and moves are refused until the next
    /// [`apply_board`](Self::apply_board).
    pub fn invalidate(&mut self) {
        self.stale = self.board.is_some();
        self.selected = None;
        self.rejected = None;
    }

    /// Current board, if any.
    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    /// Selected index, if any.
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Whether the board must be refreshed from the device before moves.
    pub fn needs_fresh_board(&self) -> bool {
        self.board.is_none() || self.stale
    }

    /// Clear selection without touching the board.
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    fn playable(&self) -> Result<&Board, GameError> {
        let board = self.board.as_ref().ok_or(GameError::NoBoard)?;
        if self.stale {
            return Err(GameError::StaleBoard);
        }
        Ok(board)
    }

    fn occupied(&self, index: usize) -> Result<(), GameError> {
        let board = self.playable()?;
        if index >= BOARD_SIZE {
            return Err(GameError::IndexOutOfRange(index));
        }
        if !board.is_occupied(index) {
            return Err(GameError::EmptyCell(index));
        }
        Ok(())
    }

    /// Map a click on a cell to the exchange it requires.
    pub fn plan_click(&self, index: usize) -> Result<Click, GameError> {
        self.playable()?;
        if self.selected == Some(index) {
            return Ok(Click::Deselect(index));
        }
        self.occupied(index)?;
        Ok(match self.selected {
            None => Click::Select(index),
            Some(first) => Click::Match {
                first,
                second: index,
            },
        })
    }

    /// Check that SELECT may be sent for `index`.
    pub fn check_select(&self, index: usize) -> Result<(), GameError> {
        if let Some(current) = self.selected {
            return Err(GameError::AlreadySelected(current));
        }
        self.occupied(index)
    }

    /// Record a SELECT the device accepted.
    pub fn confirm_select(&mut self, index: usize) -> Result<(), GameError> {
        self.check_select(index)?;
        self.selected = Some(index);
        self.rejected = None;
        Ok(())
    }

    /// Check that MATCH may be sent for `index`, returning the selected index.
    pub fn check_match(&self, index: usize) -> Result<usize, GameError> {
        let first = self.selected.ok_or(GameError::NothingSelected)?;
        self.occupied(index)?;
        Ok(first)
    }

    /// Apply the device's answer to MATCH.
    pub fn resolve_match(&mut self, index: usize, matched: bool) -> Result<MatchOutcome, GameError> {
        let first = self.check_match(index)?;
        self.selected = None;
        if matched {
            if let Some(board) = self.board.as_mut() {
                board.remove(first);
                board.remove(index);
            }
            self.rejected = None;
            Ok(MatchOutcome::Removed {
                first,
                second: index,
            })
        } else {
            self.rejected = Some((first, index));
            Ok(MatchOutcome::Rejected {
                first,
                second: index,
            })
        }
    }

    /// Clicking the selected tile again clears selection locally.
    ///
    /// Returns `false` if `index` was not the selected tile.
    pub fn deselect_same(&mut self, index: usize) -> bool {
        if self.selected != Some(index) {
            return false;
        }
        self.selected = None;
        true
    }

    /// Forget the last rejected pair.
    pub fn clear_highlight(&mut self) {
        self.rejected = None;
    }

    /// Snapshot for presentation, `None` without a board.
    pub fn view(&self) -> Option<BoardView> {
        self.board.as_ref().map(|board| self.snapshot(board))
    }

    fn snapshot(&self, board: &Board) -> BoardView {
        BoardView {
            tiles: board.to_bytes().to_vec(),
            selected: self.selected,
            highlighted: self
                .rejected
                .map(|(a, b)| vec![a, b])
                .unwrap_or_default(),
            remaining: board.remaining(),
        }
    }
}
