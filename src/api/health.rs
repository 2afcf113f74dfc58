//! Reload bookkeeping for the /health endpoint.
//! Updated by SnapshotRefresher and the manual reload route.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

#[derive(Default)]
pub struct HealthState {
    reloads_ok: AtomicU64,
    reloads_failed: AtomicU64,
    /// True when the most recent reload attempt failed. The previous snapshot is still served.
    last_reload_failed: AtomicBool,
    /// Unix seconds of the last successful reload (0 = only the startup load so far).
    last_reload_at_secs: AtomicI64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, at_secs: i64) {
        self.reloads_ok.fetch_add(1, Ordering::Relaxed);
        self.last_reload_failed.store(false, Ordering::Relaxed);
        self.last_reload_at_secs.store(at_secs, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.reloads_failed.fetch_add(1, Ordering::Relaxed);
        self.last_reload_failed.store(true, Ordering::Relaxed);
    }

    pub fn reloads_ok(&self) -> u64 {
        self.reloads_ok.load(Ordering::Relaxed)
    }

    pub fn reloads_failed(&self) -> u64 {
        self.reloads_failed.load(Ordering::Relaxed)
    }

    pub fn last_reload_failed(&self) -> bool {
        self.last_reload_failed.load(Ordering::Relaxed)
    }

    pub fn last_reload_at_secs(&self) -> Option<i64> {
        match self.last_reload_at_secs.load(Ordering::Relaxed) {
            0 => None,
            secs => Some(secs),
        }
    }
}
