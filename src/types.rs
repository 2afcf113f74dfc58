use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// One cleaned classified ad. Every attribute except the id may be null upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Listing {
    pub id: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub model: Option<String>,
    pub price: Option<f64>,
    /// cc
    pub engine_size: Option<f64>,
    pub circulation_year: Option<i32>,
    pub mileage: Option<f64>,
    pub bike_age: Option<f64>,
    pub location: Option<String>,
    pub scraped_date: Option<NaiveDate>,
    pub url: Option<String>,
}

/// One row seen by a scraper. Only existence and count matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RawScrapeRecord {
    pub source: String,
    pub scraped_date: Option<NaiveDate>,
    pub url: Option<String>,
}

// ---------------------------------------------------------------------------
// Facets
// ---------------------------------------------------------------------------

/// Categorical facets. Numeric facets are handled as ranges on `FacetSelection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Brand,
    Category,
    Model,
    Location,
}

impl Facet {
    pub fn value<'a>(&self, listing: &'a Listing) -> Option<&'a str> {
        match self {
            Facet::Brand => listing.brand.as_deref(),
            Facet::Category => listing.category.as_deref(),
            Facet::Model => listing.model.as_deref(),
            Facet::Location => listing.location.as_deref(),
        }
    }
}

/// Closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

impl NumericRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Both ends inclusive. A null value is never contained.
    pub fn contains(&self, value: Option<f64>) -> bool {
        match value {
            Some(v) => self.min <= v && v <= self.max,
            None => false,
        }
    }
}

/// Current filter state, rebuilt from every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetSelection {
    pub brand: Option<String>,
    pub category: Option<String>,
    pub models: Option<Vec<String>>,
    pub location: Option<String>,
    pub engine_size: NumericRange,
    pub circulation_year: NumericRange,
    pub price: NumericRange,
}

impl FacetSelection {
    /// No categorical selection, ranges at their configured bounds.
    pub fn unrestricted(cfg: &crate::config::Config) -> Self {
        Self {
            brand: None,
            category: None,
            models: None,
            location: None,
            engine_size: cfg.engine_size_bounds,
            circulation_year: cfg.circulation_year_bounds,
            price: cfg.price_bounds,
        }
    }

    /// Same selection with one categorical facet forced back to unset.
    pub fn without(&self, facet: Facet) -> Self {
        let mut next = self.clone();
        match facet {
            Facet::Brand => next.brand = None,
            Facet::Category => next.category = None,
            Facet::Model => next.models = None,
            Facet::Location => next.location = None,
        }
        next
    }
}

// ---------------------------------------------------------------------------
// Aggregate series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDailyCount {
    pub date: NaiveDate,
    pub source: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeCount {
    pub date: NaiveDate,
    pub count: usize,
    pub cumulative: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// `value` is None while the trailing window is not yet full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

// ---------------------------------------------------------------------------
// Scraper health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Fresh,
    Stale,
}

impl Freshness {
    pub fn color(&self) -> &'static str {
        use crate::config::palette;
        match self {
            Freshness::Fresh => palette::GREEN,
            Freshness::Stale => palette::RED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_includes_both_bounds() {
        let range = NumericRange::new(125.0, 600.0);
        assert!(range.contains(Some(125.0)));
        assert!(range.contains(Some(600.0)));
        assert!(!range.contains(Some(600.5)));
        assert!(!range.contains(Some(124.9)));
    }

    #[test]
    fn range_rejects_null() {
        assert!(!NumericRange::new(f64::MIN, f64::MAX).contains(None));
    }

    #[test]
    fn without_only_clears_the_named_facet() {
        let selection = FacetSelection {
            brand: Some("Yamaha".to_string()),
            category: Some("Sport".to_string()),
            models: Some(vec!["MT-07".to_string()]),
            location: Some("75".to_string()),
            engine_size: NumericRange::new(0.0, 1000.0),
            circulation_year: NumericRange::new(2000.0, 2020.0),
            price: NumericRange::new(0.0, 9000.0),
        };

        let cleared = selection.without(Facet::Brand);
        assert_eq!(cleared.brand, None);
        assert_eq!(cleared.category.as_deref(), Some("Sport"));
        assert_eq!(cleared.models, selection.models);
        assert_eq!(cleared.price, selection.price);
    }
}
