use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::time::interval;
use tracing::{error, info};

use crate::api::health::HealthState;
use crate::db::PgSource;
use crate::error::Result;
use crate::state::{Snapshot, SnapshotStore};

#[derive(Debug, Clone, Serialize)]
pub struct ReloadSummary {
    pub raw_rows: usize,
    pub clean_rows: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Load both tables and swap them in. On failure the current snapshot stays.
pub async fn reload(
    source: &PgSource,
    store: &SnapshotStore,
    health: &HealthState,
) -> Result<ReloadSummary> {
    let today = Local::now().date_naive();
    match Snapshot::load(source, today).await {
        Ok(snapshot) => {
            let summary = ReloadSummary {
                raw_rows: snapshot.raw.len(),
                clean_rows: snapshot.clean.len(),
                loaded_at: snapshot.loaded_at,
            };
            store.replace(snapshot).await;
            health.record_success(summary.loaded_at.timestamp());
            Ok(summary)
        }
        Err(e) => {
            health.record_failure();
            Err(e)
        }
    }
}

/// Background task that reloads the snapshot on a fixed interval.
pub struct SnapshotRefresher {
    source: PgSource,
    store: Arc<SnapshotStore>,
    health: Arc<HealthState>,
    interval_secs: u64,
}

impl SnapshotRefresher {
    pub fn new(
        source: PgSource,
        store: Arc<SnapshotStore>,
        health: Arc<HealthState>,
        interval_secs: u64,
    ) -> Self {
        Self { source, store, health, interval_secs }
    }

    pub async fn run(self) {
        if self.interval_secs == 0 {
            info!("Snapshot refresh disabled (SNAPSHOT_REFRESH_SECS=0)");
            return;
        }

        let mut ticker = interval(Duration::from_secs(self.interval_secs));
        ticker.tick().await; // skip immediate first tick, startup already loaded

        loop {
            ticker.tick().await;
            match reload(&self.source, &self.store, &self.health).await {
                Ok(summary) => info!(
                    raw_rows = summary.raw_rows,
                    clean_rows = summary.clean_rows,
                    "Snapshot refresh complete"
                ),
                Err(e) => error!("Snapshot refresh failed, keeping previous snapshot: {e}"),
            }
        }
    }
}
