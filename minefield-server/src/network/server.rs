//! WebSocket Game Server
//!
//! Accepts sockets, resolves each one to a player identity and runs two
//! pumps per connection: a reader that turns frames into hub commands and
//! a writer that drains the connection's outbound queue. Neither pump
//! touches game state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, timeout, Instant};
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, error, info, instrument, warn};

use crate::game::config::{env_opt, env_or, ConfigError};
use crate::game::state::PlayerId;
use crate::network::auth::{resolve_identity, AuthConfig};
use crate::network::hub::{HubError, HubHandle};
use crate::network::protocol::ClientMessage;
use crate::network::registry::{ConnectionId, OutboundMessage};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Accepted `Origin` values. Empty accepts any origin.
    pub allowed_origins: Vec<String>,
    /// Outbound messages buffered per client before it counts as stalled.
    pub outbound_capacity: usize,
    /// Hub command queue capacity.
    pub command_queue_capacity: usize,
    /// Close a connection after this long without any inbound frame.
    pub idle_timeout: Duration,
    /// Ping period; must be shorter than the client's idle timeout.
    pub ping_interval: Duration,
    /// Maximum time for a single frame write.
    pub write_timeout: Duration,
    /// Maximum inbound message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            max_connections: 1000,
            allowed_origins: Vec::new(),
            outbound_capacity: 256,
            command_queue_capacity: 1024,
            idle_timeout: Duration::from_secs(60),
            ping_interval: Duration::from_secs(54),
            write_timeout: Duration::from_secs(10),
            max_message_size: 4096,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let allowed_origins = env_opt::<String>("MINEFIELD_ALLOWED_ORIGINS")?
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: env_or("MINEFIELD_BIND_ADDR", defaults.bind_addr)?,
            max_connections: env_or("MINEFIELD_MAX_CONNECTIONS", defaults.max_connections)?,
            allowed_origins,
            ..defaults
        })
    }

    /// Is a handshake with this `Origin` header acceptable?
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        origin.map_or(false, |o| self.allowed_origins.iter().any(|allowed| allowed == o))
    }

    fn websocket_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(self.max_message_size);
        config.max_frame_size = Some(self.max_message_size);
        config
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Hub is gone.
    #[error("Hub error: {0}")]
    Hub(#[from] HubError),
}

/// Shared state handed to every connection task.
#[derive(Clone)]
struct ConnectionContext {
    config: Arc<ServerConfig>,
    auth: Arc<AuthConfig>,
    hub: HubHandle,
    shutdown_tx: broadcast::Sender<()>,
}

/// Decrements the live connection count when the task ends.
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// The game server.
pub struct GameServer {
    ctx: ConnectionContext,
    connections: Arc<AtomicUsize>,
    next_connection_id: AtomicU64,
}

impl GameServer {
    /// Create a server feeding `hub`. `shutdown_tx` stops the accept loop
    /// and every connection.
    pub fn new(
        config: ServerConfig,
        auth: AuthConfig,
        hub: HubHandle,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            ctx: ConnectionContext {
                config: Arc::new(config),
                auth: Arc::new(auth),
                hub,
                shutdown_tx,
            },
            connections: Arc::new(AtomicUsize::new(0)),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Bind and run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.ctx.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run the accept loop on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);
        if !self.ctx.auth.is_configured() {
            warn!("JWT_SECRET not set, every connection joins as a guest");
        }
        if self.ctx.config.allowed_origins.is_empty() {
            warn!("No allowed origins configured, accepting upgrades from any origin");
        }

        let mut shutdown_rx = self.ctx.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connection_count() >= self.ctx.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Spawn the task for one accepted socket.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let connection_id = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        self.connections.fetch_add(1, Ordering::Relaxed);
        let guard = ConnectionGuard(self.connections.clone());
        let ctx = self.ctx.clone();

        debug!("New connection {} from {}", connection_id, addr);

        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = serve_connection(stream, addr, connection_id, ctx).await {
                match e {
                    GameServerError::WebSocket(tungstenite::Error::Http(response)) => {
                        warn!("Handshake refused for {}: {}", addr, response.status());
                    }
                    e => debug!("Connection {} from {} ended: {}", connection_id, addr, e),
                }
            }
        });
    }

    /// Stop accepting and close every connection.
    pub fn shutdown(&self) {
        let _ = self.ctx.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }
}

/// Values captured from the upgrade request.
#[derive(Debug, Default)]
struct Handshake {
    token: Option<String>,
}

async fn serve_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_id: ConnectionId,
    ctx: ConnectionContext,
) -> Result<(), GameServerError> {
    let mut handshake = Handshake::default();
    let config = ctx.config.clone();

    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let origin = request.headers().get("origin").and_then(|v| v.to_str().ok());
        if !config.origin_allowed(origin) {
            let mut refusal = ErrorResponse::new(Some("origin not allowed".to_string()));
            *refusal.status_mut() = StatusCode::FORBIDDEN;
            return Err(refusal);
        }
        handshake.token = request.uri().query().and_then(|q| query_param(q, "token")).map(String::from);
        Ok(response)
    };

    let ws_stream = accept_hdr_async_with_config(stream, callback, Some(config.websocket_config())).await?;

    let identity = resolve_identity(handshake.token.as_deref(), &ctx.auth);
    let player_id = identity.player_id.clone();
    info!(
        "Connection {} from {} is {} ({})",
        connection_id, addr, player_id,
        if identity.logged_in { "logged in" } else { "guest" }
    );

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let (out_tx, out_rx) = mpsc::channel::<OutboundMessage>(config.outbound_capacity.max(1));

    ctx.hub.connect(player_id.clone(), connection_id, identity.logged_in, out_tx).await?;

    let mut writer = tokio::spawn(write_pump(ws_sender, out_rx, config.ping_interval, config.write_timeout));
    let mut writer_done = false;
    let mut shutdown_rx = ctx.shutdown_tx.subscribe();

    loop {
        tokio::select! {
            frame = timeout(config.idle_timeout, ws_receiver.next()) => {
                match frame {
                    Err(_) => {
                        debug!("Connection {} idle, closing", connection_id);
                        break;
                    }
                    Ok(Some(Ok(Message::Text(text)))) => {
                        if let Err(HubError::Closed) = handle_text(&ctx.hub, &player_id, &text) {
                            warn!("Hub stopped, closing connection {}", connection_id);
                            break;
                        }
                    }
                    Ok(Some(Ok(Message::Binary(_)))) => {
                        debug!("Binary frame from {} ignored", connection_id);
                        ctx.hub.record_malformed();
                    }
                    Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                        debug!("Client {} disconnected", connection_id);
                        break;
                    }
                    // Ping/pong only refresh the idle deadline
                    Ok(Some(Ok(_))) => {}
                    Ok(Some(Err(e))) => {
                        debug!("Read error on {}: {}", connection_id, e);
                        break;
                    }
                }
            }
            _ = &mut writer => {
                writer_done = true;
                break;
            }
            _ = shutdown_rx.recv() => break,
        }
    }

    // Hub drops the sink on disconnect, which lets the writer close the socket
    let _ = ctx.hub.disconnect(player_id.clone(), connection_id).await;

    if !writer_done && timeout(config.write_timeout, &mut writer).await.is_err() {
        writer.abort();
    }

    info!("Connection {} ({}) cleaned up", connection_id, player_id);
    Ok(())
}

/// Parse one text frame and forward it as an action.
///
/// A full hub queue loses the action but keeps the connection. Only a
/// stopped hub is reported back to the reader.
fn handle_text(hub: &HubHandle, player_id: &PlayerId, text: &str) -> Result<(), HubError> {
    match ClientMessage::from_json(text) {
        Ok(message) => match hub.submit_action(message.into_action(player_id.clone())) {
            Err(HubError::Closed) => Err(HubError::Closed),
            _ => Ok(()),
        },
        Err(e) => {
            debug!("Invalid message from {}: {}", player_id, e);
            hub.record_malformed();
            Ok(())
        }
    }
}

/// Drain the outbound queue into the socket, pinging periodically.
async fn write_pump<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<OutboundMessage>,
    ping_interval: Duration,
    write_timeout: Duration,
) where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);

    loop {
        let frame = tokio::select! {
            message = outbound.recv() => match message {
                Some(text) => Message::Text(text.to_string()),
                None => {
                    let _ = timeout(write_timeout, sink.send(Message::Close(None))).await;
                    break;
                }
            },
            _ = ping.tick() => Message::Ping(Vec::new()),
        };

        match timeout(write_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("Write failed: {}", e);
                break;
            }
            Err(_) => {
                warn!("Write timed out after {:?}", write_timeout);
                break;
            }
        }
    }
}

/// Value of `key` in a `a=1&b=2` query string.
fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}
