//! Wordgroups - server-side engine for a daily word-grouping puzzle game
//!
//! Players see a shuffled 4x4 grid of items and must find the four hidden
//! category groups, with four incorrect guesses allowed. This crate holds the
//! puzzle model, the per-session game state machine, JSON file persistence,
//! and the service tying them together; transport and accounts live outside.

pub mod game;
pub mod puzzle;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use game::{Game, GameError, GameSnapshot, GameView, GuessOutcome, MAX_INCORRECT_GUESSES};
pub use puzzle::{Color, Group, Puzzle, PuzzleCatalog, PuzzleError};
pub use service::{GameService, ServiceError};
pub use store::{GameStore, LoadWarning, StoreError};
