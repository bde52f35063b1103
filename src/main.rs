// =============================================================================
// NASDAQ Monitor: Main Entry Point
// =============================================================================
//
// Starts the refresh scheduler and the dashboard API. The first cycle runs
// immediately; later ones follow the configured refresh interval or a
// "refresh now" request from the dashboard.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod errors;
mod market_clock;
mod market_data;
mod metrics;
mod presenter;
mod refresh;
mod runtime_config;
mod scheduler;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::{MarketDataGateway, YahooClient};
use crate::runtime_config::{RuntimeConfig, CONFIG_PATH};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("NASDAQ Monitor starting up");

    let file_config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        RuntimeConfig::default()
    });
    // Environment overrides apply to this run only; `file_config` is what
    // gets written back.
    let mut config = file_config.clone();
    config.apply_env(|key| std::env::var(key).ok());

    info!(
        index = %config.index.symbol,
        symbols = ?config.watchlist.iter().map(|w| w.symbol.as_str()).collect::<Vec<_>>(),
        time_range = %config.time_range,
        refresh = %config.refresh_interval,
        "configured watchlist"
    );

    // ── 2. Provider & shared state ───────────────────────────────────────
    let gateway: Arc<dyn MarketDataGateway> = Arc::new(
        YahooClient::new(&config.provider).context("failed to build market data client")?,
    );
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(
        AppState::new(config, Some(PathBuf::from(CONFIG_PATH))).with_persisted(file_config),
    );

    info!(session = %state.clock.current_state(), "exchange session");

    // ── 3. Refresh scheduler ─────────────────────────────────────────────
    tokio::spawn(scheduler::run_refresh_loop(state.clone(), gateway));

    // ── 4. API server ────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::rest::router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received, stopping");

    if let Err(e) = state.save_settings() {
        error!(error = %e, "failed to save runtime config on shutdown");
    }

    info!("NASDAQ Monitor shut down complete.");
    Ok(())
}
