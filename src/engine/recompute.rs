//! Output-keyed recompute map. Each `ViewKind` names one dashboard output; the
//! HTTP layer only parses inputs and calls `recompute`.

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::{HISTOGRAM_BINS, SCRAPER_SOURCES, TABLE_PAGE_SIZE};
use crate::engine::aggregate::CorrelationMatrix;
use crate::engine::filter::{options_for, select};
use crate::engine::views::{
    correlation_heatmap, database_growth, distributions, price_trend, scatter_3d, spider_health,
    table_page, DatabaseGrowth, Distributions, PriceTrend, Scatter3d, SpiderPanel, TablePage,
};
use crate::error::AppError;
use crate::state::Snapshot;
use crate::types::{Facet, FacetSelection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    SpiderHealth,
    DatabaseGrowth,
    PriceTrend,
    Distributions,
    #[serde(rename = "scatter_3d")]
    Scatter3d,
    Correlation,
    Table,
    BrandOptions,
    CategoryOptions,
    ModelOptions,
    LocationOptions,
}

impl ViewKind {
    pub const ALL: [ViewKind; 11] = [
        ViewKind::SpiderHealth,
        ViewKind::DatabaseGrowth,
        ViewKind::PriceTrend,
        ViewKind::Distributions,
        ViewKind::Scatter3d,
        ViewKind::Correlation,
        ViewKind::Table,
        ViewKind::BrandOptions,
        ViewKind::CategoryOptions,
        ViewKind::ModelOptions,
        ViewKind::LocationOptions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::SpiderHealth => "spider_health",
            ViewKind::DatabaseGrowth => "database_growth",
            ViewKind::PriceTrend => "price_trend",
            ViewKind::Distributions => "distributions",
            ViewKind::Scatter3d => "scatter_3d",
            ViewKind::Correlation => "correlation",
            ViewKind::Table => "table",
            ViewKind::BrandOptions => "brand_options",
            ViewKind::CategoryOptions => "category_options",
            ViewKind::ModelOptions => "model_options",
            ViewKind::LocationOptions => "location_options",
        }
    }
}

impl std::fmt::Display for ViewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ViewKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| AppError::UnknownView(s.to_string()))
    }
}

/// Inputs shared by every view: the facet selection and the table page.
#[derive(Debug, Clone)]
pub struct ViewRequest {
    pub selection: FacetSelection,
    pub page: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", content = "data", rename_all = "snake_case")]
pub enum ViewPayload {
    SpiderHealth(Vec<SpiderPanel>),
    DatabaseGrowth(DatabaseGrowth),
    PriceTrend(PriceTrend),
    Distributions(Distributions),
    #[serde(rename = "scatter_3d")]
    Scatter3d(Scatter3d),
    Correlation(CorrelationMatrix),
    Table(TablePage),
    Options { facet: Facet, values: Vec<String> },
}

/// Pure: same snapshot, request and `today` always give the same payload.
pub fn recompute(kind: ViewKind, snapshot: &Snapshot, request: &ViewRequest, today: NaiveDate) -> ViewPayload {
    let options = |facet: Facet| ViewPayload::Options {
        facet,
        values: options_for(&snapshot.clean, &request.selection, facet),
    };

    match kind {
        ViewKind::SpiderHealth => {
            ViewPayload::SpiderHealth(spider_health(&snapshot.raw, SCRAPER_SOURCES, today))
        }
        ViewKind::DatabaseGrowth => ViewPayload::DatabaseGrowth(database_growth(&snapshot.clean)),
        ViewKind::BrandOptions => options(Facet::Brand),
        ViewKind::CategoryOptions => options(Facet::Category),
        ViewKind::ModelOptions => options(Facet::Model),
        ViewKind::LocationOptions => options(Facet::Location),
        ViewKind::PriceTrend
        | ViewKind::Distributions
        | ViewKind::Scatter3d
        | ViewKind::Correlation
        | ViewKind::Table => {
            let subset = select(&snapshot.clean, &request.selection);
            match kind {
                ViewKind::PriceTrend => ViewPayload::PriceTrend(price_trend(&subset)),
                ViewKind::Distributions => {
                    ViewPayload::Distributions(distributions(&subset, HISTOGRAM_BINS))
                }
                ViewKind::Scatter3d => {
                    ViewPayload::Scatter3d(scatter_3d(&subset, &request.selection))
                }
                ViewKind::Correlation => ViewPayload::Correlation(correlation_heatmap(&subset)),
                _ => ViewPayload::Table(table_page(&subset, request.page, TABLE_PAGE_SIZE)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Listing, NumericRange, RawScrapeRecord};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn listing(id: &str, brand: &str, category: Option<&str>, price: f64) -> Listing {
        Listing {
            id: id.to_string(),
            brand: Some(brand.to_string()),
            category: category.map(str::to_string),
            model: Some("Model".to_string()),
            price: Some(price),
            engine_size: Some(600.0),
            circulation_year: Some(2015),
            mileage: Some(20_000.0),
            bike_age: Some(9.0),
            location: Some("13".to_string()),
            scraped_date: Some(day(1)),
            url: Some("https://moto-station.example/ad".to_string()),
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot::new(
            vec![RawScrapeRecord {
                source: "4en1".to_string(),
                scraped_date: Some(day(3)),
                url: None,
            }],
            vec![
                listing("1", "Ducati", Some("Sport"), 12_000.0),
                listing("2", "Ducati", None, 8_000.0),
                listing("3", "BMW", Some("Trail"), 15_000.0),
                listing("4", "Triumph", Some("Sport"), 4_000.0),
            ],
        )
    }

    fn request() -> ViewRequest {
        ViewRequest {
            selection: FacetSelection {
                brand: None,
                category: None,
                models: None,
                location: None,
                engine_size: NumericRange::new(0.0, 2500.0),
                circulation_year: NumericRange::new(1970.0, 2030.0),
                price: NumericRange::new(0.0, 50_000.0),
            },
            page: 0,
        }
    }

    #[test]
    fn parses_every_kind_by_name() {
        for kind in ViewKind::ALL {
            assert_eq!(kind.as_str().parse::<ViewKind>().unwrap(), kind);
        }
        assert!(matches!("pie_chart".parse::<ViewKind>(), Err(AppError::UnknownView(_))));
    }

    #[test]
    fn spider_health_covers_all_configured_scrapers() {
        let payload = recompute(ViewKind::SpiderHealth, &snapshot(), &request(), day(4));
        let ViewPayload::SpiderHealth(panels) = payload else {
            panic!("wrong payload");
        };
        assert_eq!(panels.len(), SCRAPER_SOURCES.len());
        assert!(panels.iter().any(|p| p.source == "4en1"));
    }

    #[test]
    fn table_excludes_null_category_rows() {
        let mut req = request();
        req.selection.category = Some("Sport".to_string());

        let ViewPayload::Table(page) = recompute(ViewKind::Table, &snapshot(), &req, day(4)) else {
            panic!("wrong payload");
        };
        assert_eq!(page.total_rows, 2);
    }

    #[test]
    fn price_change_narrows_brand_options_but_brand_does_not() {
        let mut req = request();
        req.selection.brand = Some("BMW".to_string());
        req.selection.price = NumericRange::new(10_000.0, 50_000.0);

        let ViewPayload::Options { facet, values } =
            recompute(ViewKind::BrandOptions, &snapshot(), &req, day(4))
        else {
            panic!("wrong payload");
        };
        assert_eq!(facet, Facet::Brand);
        assert_eq!(values, vec!["BMW", "Ducati"]);
    }

    #[test]
    fn filtered_views_survive_an_empty_subset() {
        let mut req = request();
        req.selection.brand = Some("Harley-Davidson".to_string());
        let snap = snapshot();

        let ViewPayload::Table(page) = recompute(ViewKind::Table, &snap, &req, day(4)) else {
            panic!("wrong payload");
        };
        assert_eq!(page.total_rows, 0);
        assert!(page.rows.is_empty());

        let ViewPayload::PriceTrend(trend) = recompute(ViewKind::PriceTrend, &snap, &req, day(4)) else {
            panic!("wrong payload");
        };
        assert!(trend.daily_mean.is_empty());
        assert!(trend.rolling_mean.is_empty());

        let ViewPayload::Scatter3d(scatter) = recompute(ViewKind::Scatter3d, &snap, &req, day(4)) else {
            panic!("wrong payload");
        };
        assert!(scatter.points.is_empty());
    }

    #[test]
    fn payload_is_tagged_with_view_name() {
        let json = serde_json::to_value(recompute(ViewKind::Scatter3d, &snapshot(), &request(), day(4)))
            .unwrap();
        assert_eq!(json["view"], "scatter_3d");
        assert_eq!(json["data"]["color_by"], "brand");
        // the null-category listing is filtered out before plotting
        assert_eq!(json["data"]["points"].as_array().unwrap().len(), 3);
    }
}
