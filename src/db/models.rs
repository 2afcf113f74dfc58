//! Column lists for the two tables this service reads.
//!
//! Upstream column types drift (numeric vs double, bigint ids), so every
//! select casts to the exact type the row struct decodes.

use sqlx::postgres::PgRow;

use crate::types::{Listing, RawScrapeRecord};

pub trait TableRow: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin {
    const SELECT_LIST: &'static str;

    /// Rows the struct cannot decode (nulls in non-optional columns) are
    /// excluded by this condition, ANDed into the query.
    const REQUIRED: Option<&'static str> = None;
}

impl TableRow for RawScrapeRecord {
    const SELECT_LIST: &'static str = "source, scraped_date::date AS scraped_date, url";
    const REQUIRED: Option<&'static str> = Some("source IS NOT NULL");
}

impl TableRow for Listing {
    const SELECT_LIST: &'static str = "id::text AS id, brand, category, model, \
         price::float8 AS price, engine_size::float8 AS engine_size, \
         circulation_year::int4 AS circulation_year, mileage::float8 AS mileage, \
         bike_age::float8 AS bike_age, location::text AS location, \
         scraped_date::date AS scraped_date, url";
    const REQUIRED: Option<&'static str> = Some("id IS NOT NULL");
}
