//! Game State Definitions
//!
//! Board, player set and round bookkeeping owned by the hub.
//! Uses BTreeMap so player iteration order is deterministic.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::game::board::Board;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Opaque player identifier assigned by the transport layer.
///
/// Either the `userID` claim of a validated token or a generated guest id.
/// Stable for the lifetime of a connection.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Create from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh guest identifier.
    pub fn guest() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// Scoreboard entry for one connected player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Player identifier
    pub player_id: PlayerId,
    /// Generated display name
    pub display_name: String,
    /// Round score, never negative
    pub score: u32,
    /// Mines revealed by this player this round
    pub total_mine_hits: u32,
    /// Flags currently owned on the board
    pub active_flag_count: u32,
    /// Connected with a validated token?
    pub is_logged_in: bool,
}

impl Player {
    /// Create a player with zeroed counters.
    pub fn new(player_id: PlayerId, display_name: String, is_logged_in: bool) -> Self {
        Self {
            player_id,
            display_name,
            score: 0,
            total_mine_hits: 0,
            active_flag_count: 0,
            is_logged_in,
        }
    }

    /// Clear per-round counters, keeping identity.
    pub fn reset_round(&mut self) {
        self.score = 0;
        self.total_mine_hits = 0;
        self.active_flag_count = 0;
    }

    /// Subtract a penalty, flooring at 0. Returns the amount actually removed.
    pub fn apply_penalty(&mut self, penalty: u32) -> u32 {
        let removed = self.score.min(penalty);
        self.score -= removed;
        removed
    }
}

// =============================================================================
// GAME STATUS
// =============================================================================

/// Round status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    /// Accepting actions
    #[default]
    InProgress,
    /// Board cleared; waiting for the restart
    Ended,
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Everything the hub mutates: the board, the players and round metadata.
#[derive(Clone, Debug)]
pub struct GameState {
    /// Current board
    pub board: Board,
    /// Connected players (BTreeMap for deterministic iteration)
    pub players: BTreeMap<PlayerId, Player>,
    /// Round status
    pub status: GameStatus,
    /// Round number, starting at 0
    pub round: u64,
    /// Unix seconds when the current round started
    pub started_at: i64,
    /// Unix seconds of the scheduled restart, set only while ended
    pub restart_time: Option<i64>,
}

impl GameState {
    /// Create state for round 0 on the given board.
    pub fn new(board: Board, started_at: i64) -> Self {
        Self {
            board,
            players: BTreeMap::new(),
            status: GameStatus::InProgress,
            round: 0,
            started_at,
            restart_time: None,
        }
    }

    /// Get a player by ID.
    pub fn get_player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Get a player mutably by ID.
    pub fn get_player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Is the round accepting actions?
    #[inline]
    pub fn is_in_progress(&self) -> bool {
        self.status == GameStatus::InProgress
    }

    /// Mark the round ended with a restart at `restart_time`.
    pub fn end_round(&mut self, restart_time: i64) {
        self.status = GameStatus::Ended;
        self.restart_time = Some(restart_time);
    }

    /// Install a fresh board and reset every player's round counters.
    pub fn start_round(&mut self, board: Board, started_at: i64) {
        self.board = board;
        self.status = GameStatus::InProgress;
        self.round += 1;
        self.started_at = started_at;
        self.restart_time = None;
        for player in self.players.values_mut() {
            player.reset_round();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
