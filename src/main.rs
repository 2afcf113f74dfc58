mod api;
mod config;
mod db;
mod engine;
mod error;
mod refresh;
mod state;
mod types;

use std::sync::Arc;

use chrono::Local;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::RecomputeLatency;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, SCRAPER_SOURCES};
use crate::db::PgSource;
use crate::engine::views::spider_health;
use crate::error::Result;
use crate::refresh::SnapshotRefresher;
use crate::state::{Snapshot, SnapshotStore};
use crate::types::Freshness;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Data access ---
    let source = PgSource::connect(&cfg).await?;
    info!("Connected to Postgres");

    // --- Initial snapshot: fatal on failure ---
    let today = Local::now().date_naive();
    let snapshot = Snapshot::load(&source, today).await?;
    log_stale_sources(&snapshot, today);
    let store = SnapshotStore::new(snapshot);

    let health = Arc::new(HealthState::new());

    // --- Periodic reload ---
    let refresher = SnapshotRefresher::new(
        source.clone(),
        Arc::clone(&store),
        Arc::clone(&health),
        cfg.refresh_interval_secs,
    );
    tokio::spawn(async move { refresher.run().await });

    // --- HTTP API ---
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let api_state = ApiState {
        cfg: Arc::new(cfg),
        source: source.clone(),
        store,
        health,
        latency: Arc::new(RecomputeLatency::new()),
    };
    let app = router(api_state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Dashboard API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    source.close().await;
    info!("Shut down");
    Ok(())
}

fn log_stale_sources(snapshot: &Snapshot, today: chrono::NaiveDate) {
    for panel in spider_health(&snapshot.raw, SCRAPER_SOURCES, today) {
        if panel.freshness == Freshness::Stale {
            let last = panel
                .last_scraped
                .map(|d| d.to_string())
                .unwrap_or_else(|| "never".to_string());
            warn!(source = %panel.source, last_scraped = %last, "Scraper is stale");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
