//! Chart-ready payloads. Every function here is pure; an empty subset yields
//! empty series rather than an error.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{CORRELATION_EXCLUDED, ROLLING_WINDOW_DAYS, TABLE_COLUMNS};
use crate::engine::aggregate::{
    correlation_matrix, cumulative_count, daily_count, daily_count_by_source, daily_mean_price,
    freshness, last_scraped, rolling_mean, CorrelationMatrix,
};
use crate::types::{
    CumulativeCount, DailyCount, FacetSelection, Freshness, Listing, RawScrapeRecord,
    RollingPoint, SeriesPoint,
};

// ---------------------------------------------------------------------------
// Scraper health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SpiderPanel {
    pub source: String,
    pub daily: Vec<DailyCount>,
    pub last_scraped: Option<NaiveDate>,
    pub freshness: Freshness,
    pub color: &'static str,
}

/// One panel per monitored source, in configured order. A source with no rows
/// still gets a panel, empty and stale.
pub fn spider_health(raw: &[RawScrapeRecord], sources: &[&str], today: NaiveDate) -> Vec<SpiderPanel> {
    let by_source = daily_count_by_source(raw);

    sources
        .iter()
        .map(|source| {
            let daily = by_source
                .iter()
                .filter(|c| c.source == *source)
                .map(|c| DailyCount { date: c.date, count: c.count })
                .collect();
            let last = last_scraped(raw, source);
            let state = freshness(last, today);
            SpiderPanel {
                source: source.to_string(),
                daily,
                last_scraped: last,
                freshness: state,
                color: state.color(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Database growth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseGrowth {
    pub daily: Vec<CumulativeCount>,
    pub total_rows: usize,
}

pub fn database_growth(clean: &[Listing]) -> DatabaseGrowth {
    let daily = cumulative_count(&daily_count(clean, |l| l.scraped_date));
    let total_rows = daily.last().map_or(0, |d| d.cumulative);
    DatabaseGrowth { daily, total_rows }
}

// ---------------------------------------------------------------------------
// Price trend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PriceTrend {
    pub window: usize,
    pub daily_mean: Vec<SeriesPoint>,
    pub rolling_mean: Vec<RollingPoint>,
}

pub fn price_trend(subset: &[&Listing]) -> PriceTrend {
    let daily_mean = daily_mean_price(subset.iter().copied());
    let rolling = rolling_mean(&daily_mean, ROLLING_WINDOW_DAYS);
    PriceTrend {
        window: ROLLING_WINDOW_DAYS,
        daily_mean,
        rolling_mean: rolling,
    }
}

// ---------------------------------------------------------------------------
// Distributions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
}

/// Equal-width buckets spanning `[min, max]` of the finite values. The max
/// value falls in the last bucket.
pub fn histogram(values: &[f64], bins: usize) -> Histogram {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Histogram { bins: Vec::new() };
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if min == max {
        return Histogram {
            bins: vec![HistogramBin { lower: min, upper: max, count: finite.len() }],
        };
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in &finite {
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    Histogram {
        bins: counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                lower: min + width * i as f64,
                upper: min + width * (i + 1) as f64,
                count,
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Distributions {
    pub price: Histogram,
    pub bike_age: Histogram,
    pub mileage: Histogram,
    pub engine_size: Histogram,
}

pub fn distributions(subset: &[&Listing], bins: usize) -> Distributions {
    let column = |f: fn(&Listing) -> Option<f64>| -> Vec<f64> {
        subset.iter().filter_map(|l| f(*l)).collect()
    };
    Distributions {
        price: histogram(&column(|l| l.price), bins),
        bike_age: histogram(&column(|l| l.bike_age), bins),
        mileage: histogram(&column(|l| l.mileage), bins),
        engine_size: histogram(&column(|l| l.engine_size), bins),
    }
}

// ---------------------------------------------------------------------------
// 3-D scatter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorBy {
    Brand,
    Category,
    EngineSize,
}

/// Brand until a brand is picked, then category until a category is picked,
/// then engine size.
pub fn color_by(selection: &FacetSelection) -> ColorBy {
    if selection.brand.is_none() {
        ColorBy::Brand
    } else if selection.category.is_none() {
        ColorBy::Category
    } else {
        ColorBy::EngineSize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColorValue {
    Label(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub mileage: f64,
    pub bike_age: f64,
    pub price: f64,
    pub color: Option<ColorValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Scatter3d {
    pub color_by: ColorBy,
    pub points: Vec<ScatterPoint>,
}

/// Listings missing any of the three coordinates are left out.
pub fn scatter_3d(subset: &[&Listing], selection: &FacetSelection) -> Scatter3d {
    let color_by = color_by(selection);
    let points = subset
        .iter()
        .filter_map(|l| {
            let color = match color_by {
                ColorBy::Brand => l.brand.clone().map(ColorValue::Label),
                ColorBy::Category => l.category.clone().map(ColorValue::Label),
                ColorBy::EngineSize => l.engine_size.map(ColorValue::Number),
            };
            Some(ScatterPoint {
                mileage: l.mileage?,
                bike_age: l.bike_age?,
                price: l.price?,
                color,
            })
        })
        .collect();
    Scatter3d { color_by, points }
}

// ---------------------------------------------------------------------------
// Correlation heatmap
// ---------------------------------------------------------------------------

pub fn correlation_heatmap(subset: &[&Listing]) -> CorrelationMatrix {
    correlation_matrix(subset, CORRELATION_EXCLUDED)
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TablePage {
    pub columns: Vec<String>,
    /// Keys follow `columns` order.
    pub rows: Vec<Map<String, Value>>,
    /// 0-based
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub total_rows: usize,
}

pub fn table_page(subset: &[&Listing], page: usize, page_size: usize) -> TablePage {
    let page_size = page_size.max(1);
    let total_rows = subset.len();
    let page_count = total_rows.div_ceil(page_size);

    let rows = subset
        .iter()
        .skip(page.saturating_mul(page_size))
        .take(page_size)
        .map(|l| {
            TABLE_COLUMNS
                .iter()
                .map(|column| (column.to_string(), cell(l, column)))
                .collect()
        })
        .collect();

    TablePage {
        columns: TABLE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
        page,
        page_size,
        page_count,
        total_rows,
    }
}

fn cell(listing: &Listing, column: &str) -> Value {
    match column {
        "link" => listing.url.as_deref().map(link_label).into(),
        "brand" => listing.brand.clone().into(),
        "model" => listing.model.clone().into(),
        "category" => listing.category.clone().into(),
        "price" => listing.price.into(),
        "engine_size" => listing.engine_size.into(),
        "circulation_year" => listing.circulation_year.into(),
        "mileage" => listing.mileage.into(),
        "bike_age" => listing.bike_age.into(),
        "location" => listing.location.clone().into(),
        "scraped_date" => listing.scraped_date.map(|d| d.to_string()).into(),
        _ => Value::Null,
    }
}

/// Markdown link labelled with the ad's host, e.g. `[www.leparking.fr](https://www.leparking.fr/a/1)`.
pub fn link_label(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = without_scheme.split(['/', '?', '#']).next().unwrap_or_default();
    let label = if host.is_empty() { "link" } else { host };
    format!("[{label}]({url})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{palette, HISTOGRAM_BINS};
    use crate::types::NumericRange;
    use chrono::Duration;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn raw(source: &str, d: u32) -> RawScrapeRecord {
        RawScrapeRecord {
            source: source.to_string(),
            scraped_date: Some(day(d)),
            url: None,
        }
    }

    fn bike(id: &str, brand: Option<&str>, price: Option<f64>, mileage: Option<f64>) -> Listing {
        Listing {
            id: id.to_string(),
            brand: brand.map(str::to_string),
            category: Some("Roadster".to_string()),
            model: Some("MT-07".to_string()),
            price,
            engine_size: Some(689.0),
            circulation_year: Some(2019),
            mileage,
            bike_age: Some(5.0),
            location: Some("69".to_string()),
            scraped_date: Some(day(1)),
            url: Some(format!("https://www.leparking.fr/moto/{id}")),
        }
    }

    fn selection() -> FacetSelection {
        FacetSelection {
            brand: None,
            category: None,
            models: None,
            location: None,
            engine_size: NumericRange::new(0.0, 2500.0),
            circulation_year: NumericRange::new(1970.0, 2030.0),
            price: NumericRange::new(0.0, 50_000.0),
        }
    }

    #[test]
    fn spider_health_flags_stale_and_missing_sources() {
        let records = vec![raw("4en1", 9), raw("4en1", 10), raw("4en1", 10), raw("leparking", 6)];
        let panels = spider_health(&records, &["4en1", "leparking", "fulloccaz"], day(10));

        assert_eq!(panels.len(), 3);
        assert_eq!(panels[0].freshness, Freshness::Fresh);
        assert_eq!(panels[0].color, palette::GREEN);
        assert_eq!(panels[0].daily.iter().map(|d| d.count).collect::<Vec<_>>(), vec![1, 2]);

        assert_eq!(panels[1].freshness, Freshness::Stale);
        assert_eq!(panels[1].color, palette::RED);

        assert_eq!(panels[2].source, "fulloccaz");
        assert!(panels[2].daily.is_empty());
        assert_eq!(panels[2].freshness, Freshness::Stale);
    }

    #[test]
    fn database_growth_totals_rows() {
        let mut listings = vec![bike("1", Some("Yamaha"), Some(1.0), Some(1.0)); 3];
        listings[2].scraped_date = Some(day(2));
        let growth = database_growth(&listings);
        assert_eq!(growth.total_rows, 3);
        assert_eq!(growth.daily.len(), 2);
        assert_eq!(database_growth(&[]).total_rows, 0);
    }

    #[test]
    fn price_trend_uses_thirty_point_window() {
        let listings: Vec<Listing> = (0..31)
            .map(|i| Listing {
                id: i.to_string(),
                price: Some(1000.0),
                scraped_date: Some(day(1) + Duration::days(i)),
                ..Default::default()
            })
            .collect();
        let refs: Vec<&Listing> = listings.iter().collect();

        let trend = price_trend(&refs);
        assert_eq!(trend.daily_mean.len(), 31);
        assert!(trend.rolling_mean[28].value.is_none());
        assert_eq!(trend.rolling_mean[29].value, Some(1000.0));
    }

    #[test]
    fn histogram_places_extremes_in_edge_bins() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        let hist = histogram(&values, HISTOGRAM_BINS);
        assert_eq!(hist.bins.len(), 50);
        assert_eq!(hist.bins.iter().map(|b| b.count).sum::<usize>(), 101);
        assert_eq!(hist.bins[0].lower, 0.0);
        assert_eq!(hist.bins[49].upper, 100.0);
        assert_eq!(hist.bins[49].count, 3);
    }

    #[test]
    fn histogram_degenerate_inputs() {
        assert!(histogram(&[], 50).bins.is_empty());
        let single = histogram(&[4.0, 4.0], 50);
        assert_eq!(single.bins.len(), 1);
        assert_eq!(single.bins[0].count, 2);
    }

    #[test]
    fn distributions_of_empty_subset_are_empty() {
        let d = distributions(&[], HISTOGRAM_BINS);
        assert!(d.price.bins.is_empty());
        assert!(d.engine_size.bins.is_empty());
    }

    #[test]
    fn scatter_color_fallback() {
        let mut s = selection();
        assert_eq!(color_by(&s), ColorBy::Brand);
        s.brand = Some("Yamaha".to_string());
        assert_eq!(color_by(&s), ColorBy::Category);
        s.category = Some("Roadster".to_string());
        assert_eq!(color_by(&s), ColorBy::EngineSize);

        // a category alone does not skip the brand branch
        let mut s = selection();
        s.category = Some("Roadster".to_string());
        assert_eq!(color_by(&s), ColorBy::Brand);
    }

    #[test]
    fn scatter_skips_incomplete_points() {
        let a = bike("1", Some("Yamaha"), Some(6000.0), Some(10_000.0));
        let b = bike("2", Some("Honda"), Some(7000.0), None);
        let scatter = scatter_3d(&[&a, &b], &selection());

        assert_eq!(scatter.color_by, ColorBy::Brand);
        assert_eq!(scatter.points.len(), 1);
        assert_eq!(scatter.points[0].color, Some(ColorValue::Label("Yamaha".to_string())));
    }

    #[test]
    fn table_page_orders_columns_and_adds_link() {
        let listings: Vec<Listing> = (0..45)
            .map(|i| bike(&i.to_string(), Some("Yamaha"), Some(5000.0), Some(1.0)))
            .collect();
        let refs: Vec<&Listing> = listings.iter().collect();

        let page = table_page(&refs, 2, 20);
        assert_eq!(page.page_count, 3);
        assert_eq!(page.total_rows, 45);
        assert_eq!(page.rows.len(), 5);
        assert_eq!(page.columns[0], "link");

        let row = &page.rows[0];
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, TABLE_COLUMNS);
        assert!(!keys.iter().any(|k| *k == "url" || *k == "id"));
        let json = serde_json::to_string(row).unwrap();
        assert!(json.starts_with(r#"{"link":"[www.leparking.fr]"#));
        assert!(json.find(r#""brand""#) < json.find(r#""model""#));
        assert_eq!(
            row["link"],
            Value::String("[www.leparking.fr](https://www.leparking.fr/moto/40)".to_string())
        );

        assert!(table_page(&refs, 7, 20).rows.is_empty());
    }

    #[test]
    fn link_label_without_scheme() {
        assert_eq!(link_label("motovente.fr/a"), "[motovente.fr](motovente.fr/a)");
        assert_eq!(link_label(""), "[link]()");
    }
}
