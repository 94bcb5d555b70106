//! Arena Server - Authoritative multiplayer simulation server
//!
//! This is the main entry point for the game server. It handles:
//! - The UDP game socket and the fixed-step simulation loop
//! - A read-only admin HTTP surface (health, rooms)

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arena_server::app::{AppState, RoomDirectory};
use arena_server::config::Config;
use arena_server::ecs::registry;
use arena_server::game::GameServer;
use arena_server::http::build_router;
use arena_server::net::UdpTransport;
use arena_server::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(Config::from_env()?);

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    // Component ids must be fixed before any room exists
    let registry = registry::init()?;

    info!("Starting Arena Server");
    info!(
        component_kinds = registry.len(),
        tick_rate = config.tick_rate,
        "Simulation configured"
    );

    let transport = UdpTransport::bind(config.server_addr).await?;
    info!("Game socket listening on udp://{}", config.server_addr);

    let directory = Arc::new(RoomDirectory::new());

    // Spawn admin HTTP server
    if let Some(admin_addr) = config.admin_addr {
        let router = build_router(AppState::new(config.clone(), directory.clone()));
        let listener = TcpListener::bind(admin_addr).await?;

        info!("Admin server listening on {}", admin_addr);
        info!("Health check: http://{}/health", admin_addr);

        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                error!(error = %err, "Admin server stopped");
            }
        });
    }

    let server = GameServer::new(transport, config, directory);
    let counters = server.run(shutdown_signal()).await;

    info!(
        packets_received = counters.packets_received,
        packets_dropped = counters.packets_dropped,
        snapshots_sent = counters.snapshots_sent,
        players_kicked = counters.players_kicked,
        "Server shutdown complete"
    );
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
