use std::collections::HashMap;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Scheduler cadence (seconds). Hourly by default.
pub const SCRAPE_INTERVAL_SECS: u64 = 3600;

/// Per-adapter timeout when a source has no override (seconds).
pub const SOURCE_TIMEOUT_SECS: u64 = 60;

/// Currency assumed when a source does not report one.
pub const DEFAULT_CURRENCY: &str = "MXN";

/// Preferred source order for merged results. Unlisted sources rank after these.
pub const SOURCE_PRIORITY: &[&str] = &["mercadolibre", "cyberpuerta"];

pub const DEFAULT_API_PORT: u16 = 3001;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Scheduler tick (SCRAPE_INTERVAL_SECS)
    pub scrape_interval: Duration,
    /// Fire a scheduler run immediately at startup (SCRAPE_ON_STARTUP)
    pub scrape_on_startup: bool,
    /// Source keys in preference order (SOURCE_PRIORITY, comma-separated)
    pub source_priority: Vec<String>,
    pub default_currency: String,
    /// Fallback adapter timeout (SOURCE_TIMEOUT_SECS)
    pub source_timeout: Duration,
    /// Per-source timeout overrides (SOURCE_TIMEOUTS, `key:secs,...`)
    pub source_timeouts: HashMap<String, Duration>,
    /// JSON search endpoints to register (HTTP_SOURCES, `key=endpoint,...`)
    pub http_sources: Vec<(String, String)>,
    /// Deterministic demo sources to register (MOCK_SOURCES, comma-separated keys)
    pub mock_sources: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "prices.db".to_string()),
            api_port: match std::env::var("API_PORT") {
                Ok(v) => v.parse::<u16>().map_err(|_| {
                    AppError::Config("API_PORT must be a valid port number".to_string())
                })?,
                Err(_) => DEFAULT_API_PORT,
            },
            scrape_interval: positive_secs(
                std::env::var("SCRAPE_INTERVAL_SECS").ok().as_deref(),
                SCRAPE_INTERVAL_SECS,
            ),
            scrape_on_startup: std::env::var("SCRAPE_ON_STARTUP")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            source_priority: std::env::var("SOURCE_PRIORITY")
                .map(|v| split_keys(&v))
                .unwrap_or_else(|_| SOURCE_PRIORITY.iter().map(|s| s.to_string()).collect()),
            default_currency: std::env::var("DEFAULT_CURRENCY")
                .ok()
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            source_timeout: positive_secs(
                std::env::var("SOURCE_TIMEOUT_SECS").ok().as_deref(),
                SOURCE_TIMEOUT_SECS,
            ),
            source_timeouts: parse_timeouts(&std::env::var("SOURCE_TIMEOUTS").unwrap_or_default()),
            http_sources: parse_http_sources(&std::env::var("HTTP_SOURCES").unwrap_or_default()),
            mock_sources: split_keys(&std::env::var("MOCK_SOURCES").unwrap_or_default()),
        })
    }

    /// Timeout for one source: its override if configured, else the default.
    pub fn timeout_for(&self, key: &str) -> Duration {
        self.source_timeouts
            .get(key)
            .copied()
            .unwrap_or(self.source_timeout)
    }
}

/// Source keys are matched case-insensitively.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

pub fn split_keys(s: &str) -> Vec<String> {
    s.split(',')
        .map(normalize_key)
        .filter(|s| !s.is_empty())
        .collect()
}

/// A whole number of seconds above zero, else the default.
fn positive_secs(raw: Option<&str>, default: u64) -> Duration {
    Duration::from_secs(
        raw.and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(default),
    )
}

fn parse_timeouts(s: &str) -> HashMap<String, Duration> {
    s.split(',')
        .filter_map(|entry| {
            let (key, secs) = entry.split_once(':')?;
            let secs = secs.trim().parse::<u64>().ok().filter(|s| *s > 0)?;
            let key = normalize_key(key);
            (!key.is_empty()).then(|| (key, Duration::from_secs(secs)))
        })
        .collect()
}

fn parse_http_sources(s: &str) -> Vec<(String, String)> {
    s.split(',')
        .filter_map(|entry| {
            let (key, endpoint) = entry.split_once('=')?;
            let key = normalize_key(key);
            let endpoint = endpoint.trim();
            (!key.is_empty() && !endpoint.is_empty()).then(|| (key, endpoint.to_string()))
        })
        .collect()
}
