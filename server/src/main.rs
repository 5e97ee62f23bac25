use clap::Parser;
use log::info;
use server::cache::MemoryPositionCache;
use server::config::ServerConfig;
use server::network::Server;
use server::persistence::MemoryStore;
use std::sync::Arc;

/// Parses command-line arguments, then runs the combat server until it
/// stops or Ctrl+C arrives.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ServerConfig::parse();
    info!(
        "Starting combat server on {} (combat tick {}ms, AI tick {}ms)",
        config.address(),
        config.combat_tick_ms,
        config.ai_tick_ms
    );

    let mut server = Server::new(
        &config,
        Arc::new(MemoryPositionCache::new()),
        Arc::new(MemoryStore::new()),
    )
    .await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
