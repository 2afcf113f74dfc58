use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::config::STALE_AFTER_DAYS;
use crate::types::{
    CumulativeCount, DailyCount, Freshness, Listing, RawScrapeRecord, RollingPoint, SeriesPoint,
    SourceDailyCount,
};

/// Rows per date, ascending. Items without a date are skipped.
pub fn daily_count<T>(items: &[T], date_of: impl Fn(&T) -> Option<NaiveDate>) -> Vec<DailyCount> {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for item in items {
        if let Some(date) = date_of(item) {
            *counts.entry(date).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect()
}

/// Rows per (date, source), ordered by date then source.
pub fn daily_count_by_source(records: &[RawScrapeRecord]) -> Vec<SourceDailyCount> {
    let mut counts: BTreeMap<(NaiveDate, &str), usize> = BTreeMap::new();
    for record in records {
        if let Some(date) = record.scraped_date {
            *counts.entry((date, record.source.as_str())).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .map(|((date, source), count)| SourceDailyCount {
            date,
            source: source.to_string(),
            count,
        })
        .collect()
}

/// Running total over a freshly date-sorted copy of `daily`.
pub fn cumulative_count(daily: &[DailyCount]) -> Vec<CumulativeCount> {
    let mut sorted = daily.to_vec();
    sorted.sort_by_key(|d| d.date);

    let mut running = 0usize;
    sorted
        .into_iter()
        .map(|d| {
            running += d.count;
            CumulativeCount {
                date: d.date,
                count: d.count,
                cumulative: running,
            }
        })
        .collect()
}

/// Mean of non-null prices per date. Dates without a priced listing are absent.
pub fn daily_mean_price<'a>(listings: impl IntoIterator<Item = &'a Listing>) -> Vec<SeriesPoint> {
    let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for listing in listings {
        if let (Some(date), Some(price)) = (listing.scraped_date, listing.price) {
            let entry = sums.entry(date).or_insert((0.0, 0));
            entry.0 += price;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(date, (total, n))| SeriesPoint {
            date,
            value: total / n as f64,
        })
        .collect()
}

/// Trailing simple mean over `window` consecutive points. The first
/// `window - 1` positions have no value. Missing calendar dates are not filled.
pub fn rolling_mean(series: &[SeriesPoint], window: usize) -> Vec<RollingPoint> {
    series
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let value = if window == 0 || i + 1 < window {
                None
            } else {
                let slice = &series[i + 1 - window..=i];
                Some(slice.iter().map(|p| p.value).sum::<f64>() / window as f64)
            };
            RollingPoint {
                date: point.date,
                value,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

type Column = (&'static str, fn(&Listing) -> Option<f64>);

const NUMERIC_COLUMNS: &[Column] = &[
    ("price", |l| l.price),
    ("engine_size", |l| l.engine_size),
    ("circulation_year", |l| l.circulation_year.map(f64::from)),
    ("mileage", |l| l.mileage),
    ("bike_age", |l| l.bike_age),
];

/// Lower-triangular Pearson matrix. `values[i][j]` is None for `j > i` and
/// wherever the pair has fewer than two observations or no variance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

pub fn correlation_matrix(listings: &[&Listing], exclude: &[&str]) -> CorrelationMatrix {
    let columns: Vec<&Column> = NUMERIC_COLUMNS
        .iter()
        .filter(|(name, _)| !exclude.contains(name))
        .collect();

    let values = columns
        .iter()
        .enumerate()
        .map(|(i, (_, row_of))| {
            columns
                .iter()
                .enumerate()
                .map(|(j, (_, col_of))| {
                    if j > i {
                        return None;
                    }
                    // pairwise-complete observations
                    let (x, y): (Vec<f64>, Vec<f64>) = listings
                        .iter()
                        .filter_map(|l| Some((row_of(*l)?, col_of(*l)?)))
                        .unzip();
                    pearson(&x, &y)
                })
                .collect()
        })
        .collect();

    CorrelationMatrix {
        columns: columns.iter().map(|(name, _)| name.to_string()).collect(),
        values,
    }
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut numer = 0.0;
    let mut denom_x = 0.0;
    let mut denom_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        numer += dx * dy;
        denom_x += dx * dx;
        denom_y += dy * dy;
    }

    if denom_x == 0.0 || denom_y == 0.0 {
        return None;
    }

    Some((numer / (denom_x.sqrt() * denom_y.sqrt())).clamp(-1.0, 1.0))
}

// ---------------------------------------------------------------------------
// Scraper health
// ---------------------------------------------------------------------------

pub fn last_scraped(records: &[RawScrapeRecord], source: &str) -> Option<NaiveDate> {
    records
        .iter()
        .filter(|r| r.source == source)
        .filter_map(|r| r.scraped_date)
        .max()
}

/// Stale when the latest row is more than two days before `today`, or when
/// there is no row at all.
pub fn freshness(last_date: Option<NaiveDate>, today: NaiveDate) -> Freshness {
    match last_date {
        Some(date) if date >= today - Duration::days(STALE_AFTER_DAYS) => Freshness::Fresh,
        _ => Freshness::Stale,
    }
}
