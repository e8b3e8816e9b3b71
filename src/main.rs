//! Arena sync client - game-state synchronization core
//!
//! Runs one play session for the fighting, badminton and racing mini-games:
//! - Fixed-rate local simulation with optimistic player actions
//! - Streaming channel and discrete action calls to the remote AI service
//! - Local HTTP/WebSocket bridge that feeds snapshots to the renderer

mod api;
mod app;
mod config;
mod game;
mod http;
mod sync;
mod util;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::ApiClient;
use crate::app::{session, AppState};
use crate::config::Config;
use crate::http::build_router;
use crate::util::time::init_client_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Arc::new(Config::from_env()?);

    init_tracing(&config.log_level);
    init_client_time();

    info!("Starting arena sync client");
    info!(api = %config.api_base_url, ws = %config.ws_base_url, "Remote service");

    let api = Arc::new(ApiClient::new(&config)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (handle, tasks) = session::start(config.clone(), api, shutdown_rx);
    info!(session_id = %handle.session_id(), game = %config.initial_game, "Session started");

    let router = build_router(AppState::new(config.clone(), handle));

    let addr: SocketAddr = config.render_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Renderer bridge listening on {}", addr);
    info!("Snapshot stream: ws://{}/render", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the coordinator, channel and poller
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Session task ended abnormally");
        }
    }

    info!("Shutdown complete");
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
