use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror the dashboard's JSON shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HealthResponse {
    pub snapshot_loaded_at: String,
    pub raw_rows: usize,
    pub clean_rows: usize,
    pub stale_sources: Vec<String>,
    pub reloads_failed: u64,
    pub last_reload_failed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailyCount {
    pub date: String,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpiderPanel {
    pub source: String,
    pub daily: Vec<DailyCount>,
    pub last_scraped: Option<String>,
    pub freshness: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CumulativeCount {
    pub date: String,
    pub count: usize,
    pub cumulative: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseGrowth {
    pub daily: Vec<CumulativeCount>,
    pub total_rows: usize,
}

/// Every `/views/:kind` response is `{ "view": ..., "data": ... }`.
#[derive(Debug, Deserialize)]
struct ViewEnvelope<T> {
    data: T,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub health: HealthResponse,
    pub spiders: Vec<SpiderPanel>,
    pub growth: DatabaseGrowth,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            health: HealthResponse::default(),
            spiders: Vec::new(),
            growth: DatabaseGrowth::default(),
            base_url,
        }
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let health_url = format!("{}/health", self.base_url);
        let spiders_url = format!("{}/views/spider_health", self.base_url);
        let growth_url = format!("{}/views/database_growth", self.base_url);

        let (health, spiders, growth) = tokio::join!(
            fetch_json::<HealthResponse>(client, &health_url),
            fetch_json::<ViewEnvelope<Vec<SpiderPanel>>>(client, &spiders_url),
            fetch_json::<ViewEnvelope<DatabaseGrowth>>(client, &growth_url),
        );

        match (health, spiders, growth) {
            (Ok(h), Ok(s), Ok(g)) => {
                self.health = h;
                self.spiders = s.data;
                self.growth = g.data;
                self.status = ConnectionStatus::Connected;
            }
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                self.status = ConnectionStatus::Error(e);
            }
        }
    }
}

async fn fetch_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, String> {
    let resp = client.get(url).send().await.map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(format!("{url}: HTTP {}", resp.status()));
    }
    resp.json::<T>().await.map_err(|e| format!("parse error: {e}"))
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Rows scraped on the most recent day of the panel, or "—".
pub fn latest_count(panel: &SpiderPanel) -> String {
    panel
        .daily
        .last()
        .map_or("—".to_string(), |d| format!("{} ({})", d.count, short_date(&d.date)))
}

/// `2024-03-07` → `03-07`.
pub fn short_date(date: &str) -> &str {
    date.get(5..).unwrap_or(date)
}

/// Unicode bar per day, scaled to the panel's own max.
pub fn sparkline(daily: &[DailyCount]) -> String {
    const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let max = daily.iter().map(|d| d.count).max().unwrap_or(0);
    if max == 0 {
        return String::new();
    }
    daily
        .iter()
        .map(|d| BARS[(d.count * (BARS.len() - 1)) / max])
        .collect()
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
