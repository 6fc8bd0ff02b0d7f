//! # Minefield Game Server
//!
//! Authoritative server for a shared, real-time multiplayer minesweeper board.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    MINEFIELD SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  └── rng.rs      - Xorshift128+ PRNG, per-round seeds        │
//! │                                                              │
//! │  game/           - Game rules (synchronous)                  │
//! │  ├── config.rs   - Round constants                           │
//! │  ├── board.rs    - Cells, mine placement, redaction          │
//! │  ├── state.rs    - Players and round status                  │
//! │  ├── action.rs   - Reveal / flood fill / flag                │
//! │  ├── events.rs   - Cell and scoreboard events                │
//! │  └── names.rs    - Display names                             │
//! │                                                              │
//! │  network/        - Tasks and I/O                             │
//! │  ├── hub.rs      - Single-writer game loop                   │
//! │  ├── registry.rs - Per-client bounded outbound queues        │
//! │  ├── snapshot.rs - Redacted board snapshots                  │
//! │  ├── protocol.rs - JSON messages                             │
//! │  ├── auth.rs     - JWT identity                              │
//! │  └── server.rs   - WebSocket server                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering Guarantee
//!
//! Only the hub task touches `GameState`. Connection tasks send it
//! commands over one queue, so every reveal and flag is applied in a
//! single global order and each client receives results in that order.
//!
//! Board generation is a pure function of `(base_seed, round)`, so any
//! round can be regenerated for debugging.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use game::config::GameConfig;
pub use game::state::{GameState, Player, PlayerId};
pub use game::action::{Action, ActionKind, ActionOutcome};
pub use network::hub::{GameHub, HubHandle};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
