//! Game Logic Module
//!
//! Board, players and action processing. Everything here is synchronous
//! and owned by a single caller; concurrency lives in `network`.
//!
//! ## Module Structure
//!
//! - `config`: Round constants and environment parsing
//! - `board`: Cells, mine placement, adjacency, redacted views
//! - `state`: Players, round status, game state
//! - `action`: Reveal (with flood fill) and flag transitions
//! - `events`: Cell and scoreboard events produced by actions
//! - `names`: Display name generator

pub mod config;
pub mod board;
pub mod state;
pub mod action;
pub mod events;
pub mod names;

// Re-export key types
pub use config::{GameConfig, ConfigError};
pub use board::{Board, Cell, CellView, FlagState};
pub use state::{GameState, GameStatus, Player, PlayerId};
pub use action::{apply_action, Action, ActionKind, ActionOutcome};
pub use events::{CellEvent, CellEventKind, ScoreboardEvent, ScoreboardEventKind, UpdateResult};
pub use names::generate_display_name;
