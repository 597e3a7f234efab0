//! chat-relay: a readiness-driven TCP chat relay
//!
//! One process, one thread, one OS readiness multiplexer. Clients
//! speak a newline-terminated text protocol: first line sets the
//! nickname, subsequent lines are relayed to every other registered
//! client, `/quit` leaves.

mod config;
mod protocol;
mod reactor;
mod server;

use config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        max_connections = config.max_connections,
        "Starting chat relay"
    );

    server::run(config)?;
    Ok(())
}
