use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::config::Config;
use crate::db::models::TableRow;
use crate::error::{AppError, Result};

/// Read-only access to the scraping database. Never writes.
#[derive(Clone)]
pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    pub async fn connect(cfg: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.db_max_connections)
            .connect(&cfg.database_url)
            .await
            .map_err(|e| AppError::DataUnavailable(format!("failed to connect to Postgres: {e}")))?;
        Ok(Self { pool })
    }

    /// All rows of `table`, or only those scraped strictly after `min_date`.
    pub async fn fetch<T: TableRow>(&self, table: &str, min_date: Option<NaiveDate>) -> Result<Vec<T>> {
        let sql = select_sql(table, T::SELECT_LIST, T::REQUIRED, min_date.is_some())?;
        debug!(table, ?min_date, "fetching table");

        let mut query = sqlx::query_as::<_, T>(&sql);
        if let Some(date) = min_date {
            query = query.bind(date);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DataUnavailable(format!("{table}: {e}")))?;

        info!(table, rows = rows.len(), "Imported {table} data from postgres");
        Ok(rows)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn select_sql(
    table: &str,
    select_list: &str,
    required: Option<&str>,
    with_min_date: bool,
) -> Result<String> {
    if !is_plain_identifier(table) {
        return Err(AppError::InvalidTable(table.to_string()));
    }

    let mut conditions = Vec::new();
    if let Some(required) = required {
        conditions.push(required);
    }
    if with_min_date {
        conditions.push("scraped_date > $1");
    }

    let mut sql = format!("SELECT {select_list} FROM {table}");
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    Ok(sql)
}

/// `name` or `schema.name`, each part `[A-Za-z_][A-Za-z0-9_]*`.
fn is_plain_identifier(table: &str) -> bool {
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 {
        return false;
    }
    parts.iter().all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    })
}
