//! Network Layer
//!
//! The hub task and everything around it: WebSocket transport, identity,
//! wire protocol and outbound fan-out. Game rules live in `game/`.

pub mod auth;
pub mod protocol;
pub mod snapshot;
pub mod registry;
pub mod hub;
pub mod server;

pub use auth::{AuthConfig, AuthError, Identity, TokenClaims, resolve_identity, validate_token};
pub use protocol::{ClientMessage, ServerMessage, GameStatusPayload, ScoreboardPayload};
pub use snapshot::{BoardView, GameConstantsView, build_snapshot};
pub use registry::{ClientRegistry, ConnectionId, OutboundMessage};
pub use hub::{GameHub, HubCommand, HubError, HubHandle, HubMetrics, MetricsSnapshot};
pub use server::{GameServer, ServerConfig, GameServerError};
