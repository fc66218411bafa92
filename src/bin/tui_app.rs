use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct TrackedProduct {
    pub id: i64,
    pub query_term: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub last_scraped_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct ListingSnapshot {
    pub id: i64,
    pub source_key: String,
    pub display_name: String,
    pub canonical_url: String,
    pub image_url: Option<String>,
    pub latest_price: Option<f64>,
    pub currency: Option<String>,
    pub last_price_update: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct PricePoint {
    pub id: i64,
    pub listing: i64,
    pub price: f64,
    pub currency: String,
    pub observed_at: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct HealthResponse {
    pub running: bool,
    pub last_run_started_at: Option<i64>,
    pub last_run_finished_at: Option<i64>,
    pub runs_completed: u64,
    pub last_queries_processed: u64,
    pub last_queries_failed: u64,
    pub last_observations_recorded: u64,
    pub last_persistence_failures: u64,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Queries,
    Listings,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub tracked: Vec<TrackedProduct>,
    pub snapshot: Vec<ListingSnapshot>,
    pub history: Vec<PricePoint>,
    pub health: HealthResponse,
    pub focus: Pane,
    pub selected_query: Option<usize>,
    pub selected_listing: Option<usize>,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            tracked: Vec::new(),
            snapshot: Vec::new(),
            history: Vec::new(),
            health: HealthResponse::default(),
            focus: Pane::Queries,
            selected_query: None,
            selected_listing: None,
            base_url,
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Pane::Queries if !self.snapshot.is_empty() => Pane::Listings,
            _ => Pane::Queries,
        };
    }

    /// Move the selection in the focused pane. Returns true when it changed.
    pub fn move_selection(&mut self, down: bool) -> bool {
        let (selected, len) = match self.focus {
            Pane::Queries => (&mut self.selected_query, self.tracked.len()),
            Pane::Listings => (&mut self.selected_listing, self.snapshot.len()),
        };
        let next = step(*selected, len, down);
        let changed = next != *selected;
        *selected = next;

        if changed && self.focus == Pane::Queries {
            self.snapshot.clear();
            self.history.clear();
            self.selected_listing = None;
        }
        changed
    }

    pub fn current_query(&self) -> Option<&TrackedProduct> {
        self.selected_query.and_then(|i| self.tracked.get(i))
    }

    pub fn current_listing(&self) -> Option<&ListingSnapshot> {
        self.selected_listing.and_then(|i| self.snapshot.get(i))
    }

    /// Tracked queries and scheduler status, then the detail panes.
    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let tracked_url = format!("{}/api/tracked-products", self.base_url);
        let health_url = format!("{}/health", self.base_url);

        let (tracked_res, health_res) = tokio::join!(
            fetch::<Vec<TrackedProduct>>(client, &tracked_url),
            fetch::<HealthResponse>(client, &health_url),
        );

        match tracked_res {
            Ok(tracked) => {
                self.tracked = tracked;
                self.status = ConnectionStatus::Connected;
            }
            Err(e) => {
                self.status = ConnectionStatus::Error(e);
                return;
            }
        }
        if let Ok(health) = health_res {
            self.health = health;
        }

        self.selected_query = clamp(self.selected_query, self.tracked.len());
        self.refresh_details(client).await;
    }

    /// Snapshot of the selected query and history of the selected listing.
    pub async fn refresh_details(&mut self, client: &reqwest::Client) {
        let Some(term) = self.current_query().map(|q| q.query_term.clone()) else {
            self.snapshot.clear();
            self.history.clear();
            return;
        };
        let Some(url) = dashboard_url(&self.base_url, &term) else {
            return;
        };
        match fetch::<Vec<ListingSnapshot>>(client, &url).await {
            Ok(rows) => self.snapshot = rows,
            Err(e) => {
                self.status = ConnectionStatus::Error(e);
                return;
            }
        }

        self.selected_listing = clamp(self.selected_listing, self.snapshot.len());
        let Some(id) = self.current_listing().map(|l| l.id) else {
            self.history.clear();
            return;
        };
        let url = format!("{}/api/product-listings/{id}/prices", self.base_url);
        if let Ok(points) = fetch::<Vec<PricePoint>>(client, &url).await {
            self.history = points;
        }
    }
}

async fn fetch<T: serde::de::DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<T, String> {
    let resp = client.get(url).send().await.map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(format!("{} from {url}", resp.status()));
    }
    resp.json::<T>().await.map_err(|e| format!("parse error: {e}"))
}

/// Percent-encodes the term as a single path segment.
pub fn dashboard_url(base_url: &str, term: &str) -> Option<String> {
    let mut url = url::Url::parse(base_url).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(["api", "dashboard", "data", term]);
    Some(url.to_string())
}

fn step(selected: Option<usize>, len: usize, down: bool) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(match (selected, down) {
        (None, _) => 0,
        (Some(i), true) => (i + 1).min(len - 1),
        (Some(i), false) => i.saturating_sub(1),
    })
}

fn clamp(selected: Option<usize>, len: usize) -> Option<usize> {
    match selected {
        _ if len == 0 => None,
        Some(i) => Some(i.min(len - 1)),
        None => None,
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_price(price: Option<f64>, currency: Option<&str>) -> String {
    match price {
        Some(p) => format!("{p:.2} {}", currency.unwrap_or("")).trim_end().to_string(),
        None => "—".to_string(),
    }
}

/// Convert nanosecond epoch timestamp to HH:MM:SS string (UTC).
pub fn format_time_ns(ns: i64) -> String {
    let secs = (ns / 1_000_000_000) as u64;
    let h = (secs / 3600) % 24;
    let m = (secs / 60) % 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

pub fn format_opt_time(ns: Option<i64>) -> String {
    ns.map_or("never".to_string(), format_time_ns)
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64) -> TrackedProduct {
        TrackedProduct {
            id,
            query_term: format!("q{id}"),
            description: None,
            is_active: true,
            created_at: 0,
            last_scraped_at: None,
        }
    }

    #[test]
    fn selection_stays_in_bounds_and_resets_details() {
        let mut app = AppState::new("http://localhost:3001".to_string());
        assert!(!app.move_selection(true));

        app.tracked = vec![product(1), product(2)];
        assert!(app.move_selection(true));
        assert_eq!(app.selected_query, Some(0));
        app.move_selection(true);
        app.selected_listing = Some(3);
        assert!(!app.move_selection(true));
        assert_eq!(app.selected_query, Some(1));
        assert_eq!(app.selected_listing, Some(3));

        app.move_selection(false);
        assert_eq!(app.selected_query, Some(0));
        assert_eq!(app.selected_listing, None);
    }

    #[test]
    fn focus_only_moves_to_listings_when_there_are_some() {
        let mut app = AppState::new("http://localhost:3001".to_string());
        app.toggle_focus();
        assert_eq!(app.focus, Pane::Queries);
    }

    #[test]
    fn dashboard_url_encodes_the_term() {
        assert_eq!(
            dashboard_url("http://localhost:3001", "usb hub/4").as_deref(),
            Some("http://localhost:3001/api/dashboard/data/usb%20hub%2F4")
        );
    }

    #[test]
    fn formatting() {
        assert_eq!(format_price(Some(199.0), Some("MXN")), "199.00 MXN");
        assert_eq!(format_price(None, None), "—");
        assert_eq!(format_time_ns(3_723 * 1_000_000_000), "01:02:03");
        assert_eq!(truncate("Hub genérico", 5), "Hub …");
        assert_eq!(truncate("Hub", 5), "Hub");
    }
}
