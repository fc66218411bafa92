mod aggregator;
mod api;
mod config;
mod db;
mod error;
mod scheduler;
mod sources;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::aggregator::{Aggregator, FanOutExecutor, Reconciler};
use crate::api::health::HealthState;
use crate::api::latency::SourceLatency;
use crate::api::{router, ApiState};
use crate::config::Config;
use crate::db::{ListingResolver, PriceLedger, TrackedQueryStore};
use crate::error::{AppError, Result};
use crate::scheduler::Scheduler;
use crate::sources::{HttpJsonSource, MockSource, SourceRegistry};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Source registry ---
    let registry = build_registry(&cfg)?;
    if registry.is_empty() {
        warn!("No sources registered. Set HTTP_SOURCES=key=endpoint,... or MOCK_SOURCES=a,b to enable searching.");
    } else {
        info!("Registered {} sources: {}", registry.len(), registry.keys().join(", "));
    }
    info!(
        "Source priority: [{}], default currency {}",
        cfg.source_priority.join(", "),
        cfg.default_currency,
    );

    // --- Pipeline ---
    let latency = Arc::new(SourceLatency::new());
    let aggregator = Aggregator::new(
        Arc::new(registry),
        FanOutExecutor::new(Arc::clone(&latency)),
        Reconciler::new(cfg.source_priority.clone(), &cfg.default_currency),
    );
    let tracked = TrackedQueryStore::new(pool.clone());
    let resolver = ListingResolver::new(pool.clone());
    let ledger = PriceLedger::new(pool.clone());
    let health = Arc::new(HealthState::new());

    // --- Scheduler (background) ---
    let scheduler = Scheduler::new(
        aggregator.clone(),
        tracked.clone(),
        resolver.clone(),
        ledger.clone(),
        Arc::clone(&health),
    );
    let driver = Arc::clone(&scheduler);
    let (every, on_startup) = (cfg.scrape_interval, cfg.scrape_on_startup);
    tokio::spawn(async move { driver.run(every, on_startup).await });

    // --- HTTP API server ---
    let api_state = ApiState {
        aggregator,
        tracked,
        resolver,
        ledger,
        scheduler,
        health,
        latency,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_registry(cfg: &Config) -> Result<SourceRegistry> {
    let mut registry = SourceRegistry::new();

    for (key, endpoint) in &cfg.http_sources {
        let source = HttpJsonSource::new(endpoint.clone(), cfg.timeout_for(key))
            .map_err(|e| AppError::Config(format!("source {key}: {e}")))?;
        registry.register(key, Arc::new(source));
    }

    for key in &cfg.mock_sources {
        let id = key.trim_start_matches("mock_").to_string();
        let source = MockSource::new(id, Duration::from_millis(200), cfg.timeout_for(key));
        registry.register(key, Arc::new(source));
    }

    Ok(registry)
}
