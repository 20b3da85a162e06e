//! Tyr Console server.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tyr_console::config::Config;
use tyr_console::session;
use tyr_console::state::AppState;

const CONTEXT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting Tyr console");

    let config = Config::from_env().context("failed to load configuration")?;
    info!(port = config.port, base_path = %config.base_path, "Configuration loaded");

    let state = AppState::new(config.clone()).context("failed to initialize application state")?;
    spawn_context_sweeper(state.clone());

    let store = session::create_session_store(&config)
        .await
        .context("failed to create session store")?;
    let session_layer = session::session_layer(store, &config);

    let app = tyr_console::app(state, session_layer).layer(tyr_console::cors_layer(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Periodically drop console contexts whose browser went away.
fn spawn_context_sweeper(state: AppState) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(CONTEXT_SWEEP_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            state.evict_idle_contexts();
        }
    });
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
