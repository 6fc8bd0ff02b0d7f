//! Game Events
//!
//! Cell and scoreboard events produced by processing one action.
//! A batch is broadcast as a single `CELL` message and never stored.

use serde::{Serialize, Deserialize};

use crate::game::board::CellView;
use crate::game::state::{Player, PlayerId};

/// What happened to a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellEventKind {
    /// Safe cell revealed (directly or by flood fill)
    Revealed,
    /// Mine revealed
    Hit,
    /// Flag placed or removed
    Flag,
}

/// A change to one cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellEvent {
    /// Event kind
    #[serde(rename = "type")]
    pub kind: CellEventKind,
    /// Row
    pub x: usize,
    /// Column
    pub y: usize,
    /// Acting player
    pub player_id: PlayerId,
    /// Cell after the change, redacted
    pub cell: CellView,
}

/// Scoreboard change kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreboardEventKind {
    /// Player joined
    Register,
    /// Player left
    Unregister,
    /// Score changed by `value`
    Score,
    /// Player hit a mine
    MineHitIncrement,
    /// Player placed a flag
    FlagIncrement,
    /// Player's flag was removed
    FlagDecrement,
}

/// A change to one scoreboard row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardEvent {
    /// Event kind
    #[serde(rename = "type")]
    pub kind: ScoreboardEventKind,
    /// Affected player
    pub player_id: PlayerId,
    /// Score delta (SCORE only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    /// Full player record (REGISTER/UNREGISTER only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<Player>,
}

impl ScoreboardEvent {
    fn new(kind: ScoreboardEventKind, player_id: PlayerId) -> Self {
        Self { kind, player_id, value: None, player: None }
    }

    /// Player joined.
    pub fn register(player: &Player) -> Self {
        Self {
            player: Some(player.clone()),
            ..Self::new(ScoreboardEventKind::Register, player.player_id.clone())
        }
    }

    /// Player left.
    pub fn unregister(player: &Player) -> Self {
        Self {
            player: Some(player.clone()),
            ..Self::new(ScoreboardEventKind::Unregister, player.player_id.clone())
        }
    }

    /// Score delta.
    pub fn score(player_id: PlayerId, delta: i64) -> Self {
        Self {
            value: Some(delta),
            ..Self::new(ScoreboardEventKind::Score, player_id)
        }
    }

    /// Mine hit counter incremented.
    pub fn mine_hit(player_id: PlayerId) -> Self {
        Self::new(ScoreboardEventKind::MineHitIncrement, player_id)
    }

    /// Flag counter incremented.
    pub fn flag_increment(player_id: PlayerId) -> Self {
        Self::new(ScoreboardEventKind::FlagIncrement, player_id)
    }

    /// Flag counter decremented.
    pub fn flag_decrement(player_id: PlayerId) -> Self {
        Self::new(ScoreboardEventKind::FlagDecrement, player_id)
    }
}

/// Events produced by one action, in the order they happened.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    /// Cell changes
    pub cell_updates: Vec<CellEvent>,
    /// Scoreboard changes
    pub scoreboard_updates: Vec<ScoreboardEvent>,
}

impl UpdateResult {
    /// Nothing recorded?
    pub fn is_empty(&self) -> bool {
        self.cell_updates.is_empty() && self.scoreboard_updates.is_empty()
    }

    /// Record a cell change.
    pub fn push_cell(
        &mut self,
        kind: CellEventKind,
        (x, y): (usize, usize),
        player_id: &PlayerId,
        cell: CellView,
    ) {
        self.cell_updates.push(CellEvent {
            kind,
            x,
            y,
            player_id: player_id.clone(),
            cell,
        });
    }

    /// Record a scoreboard change.
    pub fn push_scoreboard(&mut self, event: ScoreboardEvent) {
        self.scoreboard_updates.push(event);
    }
}
