use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::api::health::HealthState;
use crate::api::latency::{LatencySummary, RecomputeLatency};
use crate::config::{Config, SCRAPER_SOURCES};
use crate::db::PgSource;
use crate::engine::views::spider_health;
use crate::engine::{recompute, ViewKind, ViewPayload, ViewRequest};
use crate::error::AppError;
use crate::refresh::{reload, ReloadSummary};
use crate::state::SnapshotStore;
use crate::types::{FacetSelection, Freshness, NumericRange};

#[derive(Clone)]
pub struct ApiState {
    pub cfg: Arc<Config>,
    pub source: PgSource,
    pub store: Arc<SnapshotStore>,
    pub health: Arc<HealthState>,
    pub latency: Arc<RecomputeLatency>,
}

pub fn router(state: ApiState) -> Router {
    // Dashboards are served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(get_health))
        .route("/views", get(list_views))
        .route("/views/:kind", get(get_view))
        .route("/snapshot/reload", post(reload_snapshot))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

/// Widget values as sent by the dashboard. Empty strings mean "cleared".
#[derive(Debug, Default, Deserialize)]
pub struct FacetQuery {
    pub brand: Option<String>,
    pub category: Option<String>,
    /// Comma separated.
    pub models: Option<String>,
    pub location: Option<String>,
    pub engine_min: Option<f64>,
    pub engine_max: Option<f64>,
    pub year_min: Option<f64>,
    pub year_max: Option<f64>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub page: Option<usize>,
}

impl FacetQuery {
    pub fn into_request(self, cfg: &Config) -> Result<ViewRequest, AppError> {
        let defaults = FacetSelection::unrestricted(cfg);

        let models: Option<Vec<String>> = self.models.map(|raw| {
            raw.split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect()
        });

        let selection = FacetSelection {
            brand: non_empty(self.brand),
            category: non_empty(self.category),
            models: models.filter(|m| !m.is_empty()),
            location: non_empty(self.location),
            engine_size: range("engine", self.engine_min, self.engine_max, defaults.engine_size)?,
            circulation_year: range("year", self.year_min, self.year_max, defaults.circulation_year)?,
            price: range("price", self.price_min, self.price_max, defaults.price)?,
        };

        Ok(ViewRequest {
            selection,
            page: self.page.unwrap_or(0),
        })
    }
}

/// Blank means unset. Anything else is matched exactly as sent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn range(
    name: &str,
    min: Option<f64>,
    max: Option<f64>,
    default: NumericRange,
) -> Result<NumericRange, AppError> {
    let r = NumericRange::new(min.unwrap_or(default.min), max.unwrap_or(default.max));
    if !r.min.is_finite() || !r.max.is_finite() {
        return Err(AppError::BadRequest(format!("{name} range must be finite")));
    }
    if r.min > r.max {
        return Err(AppError::BadRequest(format!(
            "{name}_min ({}) exceeds {name}_max ({})",
            r.min, r.max
        )));
    }
    Ok(r)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub snapshot_loaded_at: DateTime<Utc>,
    pub raw_rows: usize,
    pub clean_rows: usize,
    pub stale_sources: Vec<String>,
    pub reloads_ok: u64,
    pub reloads_failed: u64,
    pub last_reload_failed: bool,
    pub last_reload_at_secs: Option<i64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let snapshot = state.store.current().await;
    let stale_sources = spider_health(&snapshot.raw, SCRAPER_SOURCES, today())
        .into_iter()
        .filter(|p| p.freshness == Freshness::Stale)
        .map(|p| p.source)
        .collect();

    Json(HealthResponse {
        snapshot_loaded_at: snapshot.loaded_at,
        raw_rows: snapshot.raw.len(),
        clean_rows: snapshot.clean.len(),
        stale_sources,
        reloads_ok: state.health.reloads_ok(),
        reloads_failed: state.health.reloads_failed(),
        last_reload_failed: state.health.last_reload_failed(),
        last_reload_at_secs: state.health.last_reload_at_secs(),
    })
}

async fn list_views() -> Json<Vec<ViewKind>> {
    Json(ViewKind::ALL.to_vec())
}

async fn get_view(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
    Query(params): Query<FacetQuery>,
) -> Result<Json<ViewPayload>, AppError> {
    let kind: ViewKind = kind.parse()?;
    let request = params.into_request(&state.cfg)?;
    let snapshot = state.store.current().await;

    let started = Instant::now();
    let payload = recompute(kind, &snapshot, &request, today());
    let elapsed = started.elapsed();
    state.latency.record(elapsed);

    debug!(view = %kind, elapsed_us = elapsed.as_micros() as u64, "view recomputed");
    Ok(Json(payload))
}

async fn reload_snapshot(State(state): State<ApiState>) -> Result<Json<ReloadSummary>, AppError> {
    let summary = reload(&state.source, &state.store, &state.health).await?;
    info!(
        raw_rows = summary.raw_rows,
        clean_rows = summary.clean_rows,
        "Snapshot reloaded on request"
    );
    Ok(Json(summary))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySummary> {
    Json(state.latency.summary())
}

/// Staleness is always judged against the wall clock, never a cached date.
fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_bounds;

    fn cfg() -> Config {
        Config {
            database_url: "postgresql://localhost/test".to_string(),
            log_level: "info".to_string(),
            api_port: 8080,
            refresh_interval_secs: 0,
            db_max_connections: 1,
            engine_size_bounds: NumericRange::new(default_bounds::ENGINE_SIZE.0, default_bounds::ENGINE_SIZE.1),
            circulation_year_bounds: NumericRange::new(
                default_bounds::CIRCULATION_YEAR.0,
                default_bounds::CIRCULATION_YEAR.1,
            ),
            price_bounds: NumericRange::new(default_bounds::PRICE.0, default_bounds::PRICE.1),
        }
    }

    #[test]
    fn empty_query_is_unrestricted() {
        let request = FacetQuery::default().into_request(&cfg()).unwrap();
        assert_eq!(request.selection, FacetSelection::unrestricted(&cfg()));
        assert_eq!(request.page, 0);
    }

    #[test]
    fn cleared_widgets_count_as_unset() {
        let query = FacetQuery {
            brand: Some("".to_string()),
            models: Some(" , ".to_string()),
            ..Default::default()
        };
        let request = query.into_request(&cfg()).unwrap();
        assert_eq!(request.selection.brand, None);
        assert_eq!(request.selection.models, None);
    }

    #[test]
    fn categorical_values_are_passed_through_untrimmed() {
        let query = FacetQuery {
            brand: Some("Harley Davidson ".to_string()),
            location: Some("   ".to_string()),
            ..Default::default()
        };
        let request = query.into_request(&cfg()).unwrap();
        assert_eq!(request.selection.brand.as_deref(), Some("Harley Davidson "));
        assert_eq!(request.selection.location, None);
    }

    #[test]
    fn models_are_comma_separated() {
        let query = FacetQuery {
            models: Some("MT-07, Tracer 9".to_string()),
            ..Default::default()
        };
        let request = query.into_request(&cfg()).unwrap();
        assert_eq!(
            request.selection.models,
            Some(vec!["MT-07".to_string(), "Tracer 9".to_string()])
        );
    }

    #[test]
    fn half_set_range_keeps_default_other_side() {
        let query = FacetQuery {
            price_min: Some(3000.0),
            ..Default::default()
        };
        let request = query.into_request(&cfg()).unwrap();
        assert_eq!(request.selection.price, NumericRange::new(3000.0, default_bounds::PRICE.1));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let query = FacetQuery {
            year_min: Some(2020.0),
            year_max: Some(2010.0),
            ..Default::default()
        };
        assert!(matches!(query.into_request(&cfg()), Err(AppError::BadRequest(_))));
    }
}
