//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is JSON. Outbound messages use the envelope
//! `{"type": ..., "payload": ...}`.

use serde::{Serialize, Deserialize};

use crate::game::action::{Action, ActionKind};
use crate::game::events::{ScoreboardEvent, UpdateResult};
use crate::game::state::{GameStatus, PlayerId};
use crate::network::snapshot::BoardView;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Reveal the cell at (x, y).
    Reveal {
        /// Row.
        x: i64,
        /// Column.
        y: i64,
    },

    /// Toggle a flag on the cell at (x, y).
    Flag {
        /// Row.
        x: i64,
        /// Column.
        y: i64,
    },
}

impl ClientMessage {
    /// Attach the sender's identity, producing a hub action.
    pub fn into_action(self, player_id: PlayerId) -> Action {
        let (kind, x, y) = match self {
            ClientMessage::Reveal { x, y } => (ActionKind::Reveal, x, y),
            ClientMessage::Flag { x, y } => (ActionKind::Flag, x, y),
        };
        Action { kind, x, y, player_id }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// A player joined.
    Register(ScoreboardPayload),

    /// A player left.
    Unregister(ScoreboardPayload),

    /// Cell and scoreboard changes from one action.
    Cell(UpdateResult),

    /// Full redacted board snapshot.
    GameboardState(BoardView),

    /// Round status change.
    GameStatus(GameStatusPayload),
}

/// Scoreboard-only payload used by join/leave messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardPayload {
    /// Scoreboard changes.
    pub scoreboard_updates: Vec<ScoreboardEvent>,
}

/// Round status payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatusPayload {
    /// New status.
    pub game_status: GameStatus,
    /// Unix seconds of the scheduled restart.
    pub restart_time: Option<i64>,
}

impl ServerMessage {
    /// Join message for one player.
    pub fn register(event: ScoreboardEvent) -> Self {
        ServerMessage::Register(ScoreboardPayload { scoreboard_updates: vec![event] })
    }

    /// Leave message for one player.
    pub fn unregister(event: ScoreboardEvent) -> Self {
        ServerMessage::Unregister(ScoreboardPayload { scoreboard_updates: vec![event] })
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Player;

    #[test]
    fn test_parse_client_actions() {
        let msg = ClientMessage::from_json(r#"{"type":"REVEAL","x":3,"y":7}"#).unwrap();
        assert_eq!(msg, ClientMessage::Reveal { x: 3, y: 7 });

        let msg = ClientMessage::from_json(r#"{"type":"FLAG","x":-1,"y":0}"#).unwrap();
        let action = msg.into_action(PlayerId::from("p1"));
        assert_eq!(action.kind, ActionKind::Flag);
        assert_eq!((action.x, action.y), (-1, 0));
        assert_eq!(action.player_id, PlayerId::from("p1"));
    }

    #[test]
    fn test_rejects_malformed_client_messages() {
        assert!(ClientMessage::from_json(r#"{"type":"EXPLODE","x":1,"y":1}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"type":"REVEAL","x":1}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"type":"REVEAL","x":"a","y":1}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn test_register_envelope() {
        let player = Player::new(PlayerId::from("p1"), "LunarOtter101".into(), false);
        let json: serde_json::Value =
            serde_json::from_str(&ServerMessage::register(ScoreboardEvent::register(&player)).to_json().unwrap())
                .unwrap();

        assert_eq!(json["type"], "REGISTER");
        let update = &json["payload"]["scoreboardUpdates"][0];
        assert_eq!(update["type"], "REGISTER");
        assert_eq!(update["playerId"], "p1");
        assert_eq!(update["player"]["displayName"], "LunarOtter101");
    }

    #[test]
    fn test_game_status_envelope() {
        let msg = ServerMessage::GameStatus(GameStatusPayload {
            game_status: GameStatus::Ended,
            restart_time: Some(1_700_000_030),
        });
        let json = msg.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"type":"GAME_STATUS","payload":{"gameStatus":"ENDED","restartTime":1700000030}}"#
        );

        assert_eq!(ServerMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_cell_envelope_type() {
        let json: serde_json::Value =
            serde_json::from_str(&ServerMessage::Cell(UpdateResult::default()).to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "CELL");
        assert!(json["payload"]["cellUpdates"].is_array());
    }
}
