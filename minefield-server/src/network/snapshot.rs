//! Board Snapshots
//!
//! Client-safe view of the whole game: every cell passed through the
//! same redaction as cell events, plus constants, status and players.

use serde::{Serialize, Deserialize};

use crate::game::board::CellView;
use crate::game::config::GameConfig;
use crate::game::state::{GameState, GameStatus, Player};

/// Full redacted snapshot sent as `GAMEBOARD_STATE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    /// Cells indexed `[x][y]`
    pub cells: Vec<Vec<CellView>>,
    /// Non-mine cells still hidden
    pub cells_to_reveal: usize,
    /// Round constants
    pub game_constants: GameConstantsView,
    /// Round status
    pub game_status: GameStatus,
    /// Unix seconds of the scheduled restart, if ended
    pub restart_time: Option<i64>,
    /// Connected players ordered by id
    pub players: Vec<Player>,
}

/// Constants of the current round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConstantsView {
    /// Unix seconds when the round started
    pub game_start_time: i64,
    /// Board side length
    pub game_board_size: usize,
    /// Mine probability
    pub mines_multiplier: f64,
    /// Base points per revealed cell
    pub reveal_reward: u32,
    /// Points lost per mine hit
    pub mine_hit_penalty: u32,
    /// Seconds between round end and restart
    pub restart_delay_secs: u64,
}

/// Build the snapshot for the current state.
pub fn build_snapshot(state: &GameState, config: &GameConfig) -> BoardView {
    let cells = state.board
        .rows()
        .map(|row| row.iter().map(|cell| cell.view()).collect())
        .collect();

    BoardView {
        cells,
        cells_to_reveal: state.board.cells_to_reveal,
        game_constants: GameConstantsView {
            game_start_time: state.started_at,
            game_board_size: state.board.size(),
            mines_multiplier: config.mine_probability,
            reveal_reward: config.reveal_reward,
            mine_hit_penalty: config.mine_hit_penalty,
            restart_delay_secs: config.restart_delay.as_secs(),
        },
        game_status: state.status,
        restart_time: state.restart_time,
        players: state.players.values().cloned().collect(),
    }
}
