//! Game Hub
//!
//! The single writer. One task owns the `GameState` and the client
//! registry; connection tasks talk to it only through `HubCommand`s on a
//! bounded queue, so every mutation happens in one global order.
//!
//! ```text
//! reader tasks ──HubCommand──▶ GameHub::run ──Arc<str>──▶ writer tasks
//!                                   │
//!                          restart deadline (sleep_until)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::core::rng::{derive_round_seed, entropy_seed, DeterministicRng};
use crate::game::action::{apply_action, Action, ActionOutcome};
use crate::game::board::Board;
use crate::game::config::{GameConfig, MAX_RESTART_DELAY};
use crate::game::events::ScoreboardEvent;
use crate::game::names::generate_display_name;
use crate::game::state::{GameState, GameStatus, Player, PlayerId};
use crate::network::protocol::{GameStatusPayload, ServerMessage};
use crate::network::registry::{ClientRegistry, ClientSink, ConnectionId, OutboundMessage};
use crate::network::snapshot::build_snapshot;

// =============================================================================
// COMMANDS AND ERRORS
// =============================================================================

/// Inbound events for the hub.
#[derive(Debug)]
pub enum HubCommand {
    /// A socket was accepted for `player_id`.
    Connect {
        /// Player identity
        player_id: PlayerId,
        /// Accepted socket
        connection_id: ConnectionId,
        /// Authenticated with a token?
        logged_in: bool,
        /// Outbound queue for this connection
        sink: mpsc::Sender<OutboundMessage>,
    },
    /// A socket closed.
    Disconnect {
        /// Player identity
        player_id: PlayerId,
        /// Socket that closed
        connection_id: ConnectionId,
    },
    /// A player action.
    Action(Action),
}

/// Hub errors seen by connection tasks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    /// The hub task has exited.
    #[error("hub is not running")]
    Closed,
    /// The command queue is full.
    #[error("hub command queue is full")]
    QueueFull,
}

// =============================================================================
// METRICS
// =============================================================================

/// Counters for every lossy or lifecycle path of the hub.
#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Outbound messages dropped on a full client queue
    pub messages_dropped: AtomicU64,
    /// Clients evicted as stalled
    pub clients_evicted: AtomicU64,
    /// Malformed or out-of-bounds actions
    pub actions_rejected: AtomicU64,
    /// Actions dropped on a full command queue
    pub actions_dropped: AtomicU64,
    /// Rounds ended by clearing the board
    pub rounds_completed: AtomicU64,
    /// Rounds started by the restart timer
    pub rounds_restarted: AtomicU64,
}

/// Point-in-time copy of [`HubMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Outbound messages dropped
    pub messages_dropped: u64,
    /// Clients evicted
    pub clients_evicted: u64,
    /// Actions rejected
    pub actions_rejected: u64,
    /// Actions dropped
    pub actions_dropped: u64,
    /// Rounds completed
    pub rounds_completed: u64,
    /// Rounds restarted
    pub rounds_restarted: u64,
}

impl HubMetrics {
    /// Read every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            clients_evicted: self.clients_evicted.load(Ordering::Relaxed),
            actions_rejected: self.actions_rejected.load(Ordering::Relaxed),
            actions_dropped: self.actions_dropped.load(Ordering::Relaxed),
            rounds_completed: self.rounds_completed.load(Ordering::Relaxed),
            rounds_restarted: self.rounds_restarted.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable sender side of the hub, held by connection tasks.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
    metrics: Arc<HubMetrics>,
}

impl HubHandle {
    /// Register a connection. Waits for queue space.
    pub async fn connect(
        &self,
        player_id: PlayerId,
        connection_id: ConnectionId,
        logged_in: bool,
        sink: mpsc::Sender<OutboundMessage>,
    ) -> Result<(), HubError> {
        self.tx
            .send(HubCommand::Connect { player_id, connection_id, logged_in, sink })
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Report a closed connection. Waits for queue space.
    pub async fn disconnect(&self, player_id: PlayerId, connection_id: ConnectionId) -> Result<(), HubError> {
        self.tx
            .send(HubCommand::Disconnect { player_id, connection_id })
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Submit an action without waiting. Dropped and counted when full.
    pub fn submit_action(&self, action: Action) -> Result<(), HubError> {
        match self.tx.try_send(HubCommand::Action(action)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.actions_dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Hub command queue full, dropping action");
                Err(HubError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(HubError::Closed),
        }
    }

    /// Count an inbound frame that could not be parsed.
    pub fn record_malformed(&self) {
        self.metrics.actions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Shared hub counters.
    pub fn metrics(&self) -> &Arc<HubMetrics> {
        &self.metrics
    }
}

// =============================================================================
// HUB
// =============================================================================

/// The authoritative game loop.
pub struct GameHub {
    config: GameConfig,
    state: GameState,
    clients: ClientRegistry,
    commands: mpsc::Receiver<HubCommand>,
    base_seed: u64,
    names: DeterministicRng,
    /// Pending restart; set exactly while the round is ended
    restart_at: Option<Instant>,
    metrics: Arc<HubMetrics>,
}

impl GameHub {
    /// Create the hub with round 0 generated, plus its handle.
    pub fn new(config: GameConfig, queue_capacity: usize) -> (Self, HubHandle) {
        let base_seed = config.seed.unwrap_or_else(entropy_seed);
        let metrics = Arc::new(HubMetrics::default());
        let (tx, commands) = mpsc::channel(queue_capacity.max(1));

        let board = generate_board(&config, base_seed, 0);
        info!(
            "Round 0 board: {}x{}, {} mines",
            board.size(), board.size(), board.mine_count()
        );

        let hub = Self {
            state: GameState::new(board, unix_now()),
            clients: ClientRegistry::new(metrics.clone()),
            commands,
            base_seed,
            names: DeterministicRng::new(base_seed ^ 0x4E41_4D45),
            restart_at: None,
            metrics: metrics.clone(),
            config,
        };

        (hub, HubHandle { tx, metrics })
    }

    /// Read-only view of the state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Run until shutdown or until every handle is dropped.
    #[instrument(skip_all)]
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> GameState {
        info!("Game hub running");

        loop {
            // Shutdown wins over queued commands: nothing is applied after it
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = sleep_until_deadline(self.restart_at) => {
                    self.restart_round();
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => {
                            info!("All hub handles dropped");
                            break;
                        }
                    }
                }
            }

            self.evict_stalled();
        }

        info!("Game hub stopped after {} rounds", self.state.round + 1);
        self.state
    }

    fn handle_command(&mut self, command: HubCommand) {
        #[cfg(feature = "debug-tracing")]
        debug!("Hub command: {:?}", command);

        match command {
            HubCommand::Connect { player_id, connection_id, logged_in, sink } => {
                self.handle_connect(player_id, connection_id, logged_in, sink);
            }
            HubCommand::Disconnect { player_id, connection_id } => {
                self.handle_disconnect(&player_id, connection_id);
            }
            HubCommand::Action(action) => self.handle_action(&action),
        }
    }

    fn handle_connect(
        &mut self,
        player_id: PlayerId,
        connection_id: ConnectionId,
        logged_in: bool,
        tx: mpsc::Sender<OutboundMessage>,
    ) {
        let replaced = self.clients.insert(player_id.clone(), ClientSink { connection_id, tx });

        if let Some(old) = replaced {
            info!(
                "Player {} reconnected on {}, superseding {}",
                player_id, connection_id, old.connection_id
            );
        }

        if !self.state.players.contains_key(&player_id) {
            let name = generate_display_name(&mut self.names);
            let player = Player::new(player_id.clone(), name, logged_in);
            info!(
                "Player {} joined as {} ({} online)",
                player_id, player.display_name, self.clients.len()
            );

            let event = ScoreboardEvent::register(&player);
            self.state.players.insert(player_id.clone(), player);
            self.clients.broadcast(&ServerMessage::register(event));
        }

        let snapshot = build_snapshot(&self.state, &self.config);
        self.clients.send_to(&player_id, &ServerMessage::GameboardState(snapshot));
    }

    fn handle_disconnect(&mut self, player_id: &PlayerId, connection_id: ConnectionId) {
        if self.clients.connection_id(player_id) != Some(connection_id) {
            debug!("Ignoring stale disconnect for {} on {}", player_id, connection_id);
            return;
        }

        self.clients.remove(player_id);
        self.remove_player(player_id);
    }

    fn remove_player(&mut self, player_id: &PlayerId) {
        if let Some(player) = self.state.players.remove(player_id) {
            info!(
                "Player {} ({}) left ({} online)",
                player_id, player.display_name, self.clients.len()
            );
            self.clients.broadcast(&ServerMessage::unregister(ScoreboardEvent::unregister(&player)));
        }
    }

    fn handle_action(&mut self, action: &Action) {
        if !self.state.is_in_progress() {
            return;
        }

        match apply_action(&mut self.state, &self.config, action) {
            ActionOutcome::OutOfBounds => {
                self.metrics.actions_rejected.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Out-of-bounds {:?} ({}, {}) from {}",
                    action.kind, action.x, action.y, action.player_id
                );
                return;
            }
            ActionOutcome::Ignored => {}
            ActionOutcome::Applied(updates) => {
                if !updates.is_empty() {
                    self.clients.broadcast(&ServerMessage::Cell(updates));
                }
            }
        }

        self.check_win_condition();
    }

    fn check_win_condition(&mut self) {
        if !self.state.is_in_progress() || !self.state.board.is_cleared() {
            return;
        }

        let delay = self.config.restart_delay.min(MAX_RESTART_DELAY);
        let restart_time = unix_now().saturating_add(delay.as_secs() as i64);
        self.state.end_round(restart_time);
        self.restart_at = Some(Instant::now() + delay);
        self.metrics.rounds_completed.fetch_add(1, Ordering::Relaxed);

        info!("Round {} cleared, restarting in {}s", self.state.round, delay.as_secs());

        self.clients.broadcast(&ServerMessage::GameStatus(GameStatusPayload {
            game_status: GameStatus::Ended,
            restart_time: Some(restart_time),
        }));
    }

    fn restart_round(&mut self) {
        self.restart_at = None;

        let board = generate_board(&self.config, self.base_seed, self.state.round + 1);
        let mines = board.mine_count();
        self.state.start_round(board, unix_now());
        self.metrics.rounds_restarted.fetch_add(1, Ordering::Relaxed);

        info!("Round {} started with {} mines", self.state.round, mines);

        let snapshot = build_snapshot(&self.state, &self.config);
        self.clients.broadcast(&ServerMessage::GameboardState(snapshot));
    }

    /// Drop every client whose queue overflowed during the last event.
    fn evict_stalled(&mut self) {
        loop {
            let stalled = self.clients.take_stalled();
            if stalled.is_empty() {
                break;
            }

            for player_id in stalled {
                if let Some(sink) = self.clients.remove(&player_id) {
                    self.metrics.clients_evicted.fetch_add(1, Ordering::Relaxed);
                    warn!("Evicting stalled client {} ({})", player_id, sink.connection_id);
                    drop(sink);
                    self.remove_player(&player_id);
                }
            }
        }
    }
}

fn generate_board(config: &GameConfig, base_seed: u64, round: u64) -> Board {
    let mut rng = DeterministicRng::new(derive_round_seed(base_seed, round));
    Board::generate(config.board_size, config.mine_probability, &mut rng)
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

// =============================================================================
// TESTS
// =============================================================================
