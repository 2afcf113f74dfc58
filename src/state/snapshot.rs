use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::config::{CLEAN_TABLE, RAW_LOOKBACK_DAYS, RAW_TABLE, SCRAPER_SOURCES};
use crate::db::PgSource;
use crate::error::Result;
use crate::types::{Listing, RawScrapeRecord};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Both tables as loaded at one point in time. Never mutated after construction.
#[derive(Debug)]
pub struct Snapshot {
    pub raw: Vec<RawScrapeRecord>,
    pub clean: Vec<Listing>,
    pub loaded_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(raw: Vec<RawScrapeRecord>, clean: Vec<Listing>) -> Self {
        Self {
            raw,
            clean,
            loaded_at: Utc::now(),
        }
    }

    /// Raw rows limited to the monitored scrapers and the lookback window; all
    /// cleaned rows.
    pub async fn load(source: &PgSource, today: NaiveDate) -> Result<Self> {
        let since = today - Duration::days(RAW_LOOKBACK_DAYS);
        // the fetch filter is strict, so ask for one extra day and trim below
        let raw = source
            .fetch::<RawScrapeRecord>(RAW_TABLE, Some(since - Duration::days(1)))
            .await?;
        let fetched = raw.len();
        let raw = retain_monitored(raw, SCRAPER_SOURCES, since);

        let clean = source.fetch::<Listing>(CLEAN_TABLE, None).await?;

        info!(
            raw_rows = raw.len(),
            raw_dropped = fetched - raw.len(),
            clean_rows = clean.len(),
            "Snapshot loaded"
        );
        Ok(Self::new(raw, clean))
    }
}

/// Keeps rows from `sources` scraped on or after `since`.
pub fn retain_monitored(
    mut records: Vec<RawScrapeRecord>,
    sources: &[&str],
    since: NaiveDate,
) -> Vec<RawScrapeRecord> {
    records.retain(|r| {
        sources.contains(&r.source.as_str()) && r.scraped_date.is_some_and(|d| d >= since)
    });
    records
}

// ---------------------------------------------------------------------------
// SnapshotStore
// ---------------------------------------------------------------------------

/// Holds the current snapshot. Readers take an `Arc` and drop the lock at once,
/// so a reload never waits on an in-flight recompute.
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new(initial: Snapshot) -> Arc<Self> {
        Arc::new(Self {
            current: RwLock::new(Arc::new(initial)),
        })
    }

    pub async fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// Swap in `next`, returning the snapshot it replaced.
    pub async fn replace(&self, next: Snapshot) -> Arc<Snapshot> {
        let mut guard = self.current.write().await;
        std::mem::replace(&mut *guard, Arc::new(next))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn raw(source: &str, date: Option<NaiveDate>) -> RawScrapeRecord {
        RawScrapeRecord {
            source: source.to_string(),
            scraped_date: date,
            url: None,
        }
    }

    #[test]
    fn retain_monitored_drops_unknown_sources_and_old_rows() {
        let records = vec![
            raw("4en1", Some(day(10))),
            raw("4en1", Some(day(9))),
            raw("some-new-spider", Some(day(10))),
            raw("leparking", None),
            raw("leparking", Some(day(20))),
        ];
        let kept = retain_monitored(records, &["4en1", "leparking"], day(10));

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].scraped_date, Some(day(10)));
        assert_eq!(kept[1].source, "leparking");
    }

    #[tokio::test]
    async fn readers_keep_their_snapshot_across_reload() {
        let store = SnapshotStore::new(Snapshot::new(vec![raw("4en1", Some(day(1)))], Vec::new()));

        let before = store.current().await;
        let previous = store.replace(Snapshot::new(Vec::new(), vec![Listing::default()])).await;

        assert!(Arc::ptr_eq(&before, &previous));
        assert_eq!(before.raw.len(), 1);

        let after = store.current().await;
        assert!(after.raw.is_empty());
        assert_eq!(after.clean.len(), 1);
    }
}
