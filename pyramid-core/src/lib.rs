//! # pyramid-core
//!
//! Pure logic for the Mahjong pyramid client (no I/O, instant tests).
//!
//! This crate implements the board model and the session state machine
//! without any serial or timer I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`Board`] and [`GameState`] hold the client's copy of the pyramid and the
//!   two-phase select/match interaction
//! - [`SessionState`] takes link events and returns the next state plus a list
//!   of [`Action`]s
//!
//! The actual I/O (serial reads and writes, the retry timer) is performed by
//! `pyramid-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod board;
pub mod game;
pub mod state;

pub use board::Board;
pub use game::{BoardView, Click, GameError, GameState, MatchOutcome};
pub use state::{Action, Event, SessionEvent, SessionState};
