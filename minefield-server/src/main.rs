//! Minefield Game Server
//!
//! Runs one shared board: the hub task plus the WebSocket front door.

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use minefield::{
    VERSION,
    game::config::GameConfig,
    network::{AuthConfig, GameHub, GameServer, ServerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let game_config = GameConfig::from_env().context("invalid game configuration")?;
    let server_config = ServerConfig::from_env().context("invalid server configuration")?;
    let auth_config = AuthConfig::from_env();

    info!("Minefield Server v{}", VERSION);
    info!(
        "Board {}x{}, mine probability {}, restart delay {}s",
        game_config.board_size,
        game_config.board_size,
        game_config.mine_probability,
        game_config.restart_delay.as_secs()
    );

    let (shutdown_tx, _) = broadcast::channel(1);

    let (hub, handle) = GameHub::new(game_config, server_config.command_queue_capacity);
    let metrics = handle.metrics().clone();
    let hub_task = tokio::spawn(hub.run(shutdown_tx.subscribe()));

    let server = GameServer::new(server_config, auth_config, handle, shutdown_tx.clone());

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                let _ = shutdown_tx.send(());
                let _ = hub_task.await;
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            server.shutdown();
        }
    }

    let _ = hub_task.await;
    info!("Final counters: {:?}", metrics.snapshot());
    Ok(())
}
