//! Client Registry
//!
//! Outbound queues of every connected client, owned by the hub.
//!
//! Each client has a bounded queue drained by its writer task. Sends never
//! wait: when a queue is full the message is dropped for that client only
//! and the client is marked stalled. The hub evicts stalled clients after
//! the event that overflowed them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::game::state::PlayerId;
use crate::network::hub::HubMetrics;
use crate::network::protocol::ServerMessage;

/// Serialized message shared by every recipient.
pub type OutboundMessage = Arc<str>;

/// Server-unique id of one accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A registered client's outbound queue.
#[derive(Debug)]
pub struct ClientSink {
    /// Connection the queue belongs to
    pub connection_id: ConnectionId,
    /// Sending half of the writer task's queue
    pub tx: mpsc::Sender<OutboundMessage>,
}

/// All registered clients keyed by player.
#[derive(Debug)]
pub struct ClientRegistry {
    clients: BTreeMap<PlayerId, ClientSink>,
    stalled: BTreeSet<PlayerId>,
    metrics: Arc<HubMetrics>,
}

impl ClientRegistry {
    /// Create an empty registry reporting into `metrics`.
    pub fn new(metrics: Arc<HubMetrics>) -> Self {
        Self {
            clients: BTreeMap::new(),
            stalled: BTreeSet::new(),
            metrics,
        }
    }

    /// Register a sink, returning the one it replaces.
    pub fn insert(&mut self, player_id: PlayerId, sink: ClientSink) -> Option<ClientSink> {
        self.stalled.remove(&player_id);
        self.clients.insert(player_id, sink)
    }

    /// Remove a client's sink. Dropping it closes the writer's queue.
    pub fn remove(&mut self, player_id: &PlayerId) -> Option<ClientSink> {
        self.stalled.remove(player_id);
        self.clients.remove(player_id)
    }

    /// Connection currently registered for a player.
    pub fn connection_id(&self, player_id: &PlayerId) -> Option<ConnectionId> {
        self.clients.get(player_id).map(|sink| sink.connection_id)
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// No clients?
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Send to one client.
    pub fn send_to(&mut self, player_id: &PlayerId, message: &ServerMessage) {
        if let Some(text) = encode(message) {
            self.push(player_id, text);
        }
    }

    /// Send to every client. The message is serialized once.
    pub fn broadcast(&mut self, message: &ServerMessage) {
        let Some(text) = encode(message) else {
            return;
        };

        let ids: Vec<PlayerId> = self.clients.keys().cloned().collect();
        for player_id in &ids {
            self.push(player_id, text.clone());
        }
    }

    /// Drain the set of clients whose queues overflowed.
    pub fn take_stalled(&mut self) -> Vec<PlayerId> {
        std::mem::take(&mut self.stalled).into_iter().collect()
    }

    fn push(&mut self, player_id: &PlayerId, text: OutboundMessage) {
        let Some(sink) = self.clients.get(player_id) else {
            return;
        };

        match sink.tx.try_send(text) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.messages_dropped.fetch_add(1, Ordering::Relaxed);
                if self.stalled.insert(player_id.clone()) {
                    warn!("Outbound queue full for {} ({}), dropping message", player_id, sink.connection_id);
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Writer already gone; its disconnect is on the way
                debug!("Outbound queue closed for {} ({})", player_id, sink.connection_id);
            }
        }
    }
}

fn encode(message: &ServerMessage) -> Option<OutboundMessage> {
    match message.to_json() {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            error!("Failed to serialize message: {}", e);
            None
        }
    }
}
