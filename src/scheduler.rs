use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::aggregator::Aggregator;
use crate::api::health::HealthState;
use crate::db::models::TrackedQueryRow;
use crate::db::{now_ns, ListingResolver, PriceLedger, TrackedQueryStore};
use crate::error::Result;

/// Counters for one scheduler run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub started_at: i64,
    pub queries_processed: usize,
    /// Queries whose pipeline failed at the boundary (no sources, orchestration).
    pub queries_failed: usize,
    pub listings_seen: usize,
    pub listings_persisted: usize,
    pub observations_recorded: usize,
    pub persistence_failures: usize,
}

/// Re-runs every active tracked query on a fixed cadence and persists price
/// changes.
///
/// Queries are processed one after another, never interleaved; the sources for
/// a single query still run concurrently. A run-in-progress guard makes an
/// overlapping trigger (timer or manual) a logged no-op.
pub struct Scheduler {
    aggregator: Aggregator,
    tracked: TrackedQueryStore,
    resolver: ListingResolver,
    ledger: PriceLedger,
    health: Arc<HealthState>,
    run_lock: Arc<Mutex<()>>,
}

impl Scheduler {
    pub fn new(
        aggregator: Aggregator,
        tracked: TrackedQueryStore,
        resolver: ListingResolver,
        ledger: PriceLedger,
        health: Arc<HealthState>,
    ) -> Arc<Self> {
        Arc::new(Self {
            aggregator,
            tracked,
            resolver,
            ledger,
            health,
            run_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Periodic driver. With `run_on_startup` the first tick fires immediately.
    pub async fn run(self: Arc<Self>, every: Duration, run_on_startup: bool) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        if !run_on_startup {
            ticker.tick().await; // consume immediate first tick
        }

        info!("Scheduler armed: every {}s", every.as_secs());
        loop {
            ticker.tick().await;
            info!("Scheduled run triggered");
            self.run_once().await;
        }
    }

    /// Start a run in the background. Returns false when one is already active.
    pub fn trigger(self: &Arc<Self>) -> bool {
        let Ok(guard) = Arc::clone(&self.run_lock).try_lock_owned() else {
            return false;
        };
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            this.run_locked().await;
        });
        true
    }

    /// One full pass over the active queries. `None` when another run holds the guard.
    pub async fn run_once(&self) -> Option<RunReport> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            warn!("Scheduler run already in progress; skipping this trigger");
            return None;
        };
        Some(self.run_locked().await)
    }

    async fn run_locked(&self) -> RunReport {
        let mut report = RunReport {
            started_at: now_ns(),
            ..RunReport::default()
        };
        self.health.run_started(report.started_at);
        info!("Starting scheduled scrape run");

        let queries = match self.tracked.list_active().await {
            Ok(q) => q,
            Err(e) => {
                error!("Error fetching tracked products: {e}");
                self.health.run_finished(&report, now_ns());
                return report;
            }
        };
        if queries.is_empty() {
            info!("No active products to track");
        }

        for query in &queries {
            match self.process_query(query, &mut report).await {
                Ok(()) => report.queries_processed += 1,
                Err(e) => {
                    report.queries_failed += 1;
                    error!(query = %query.query_term, "Skipping \"{}\" this cycle: {e}", query.query_term);
                }
            }
            // stamped whatever the outcome
            if let Err(e) = self.tracked.mark_scraped(query.id, report.started_at).await {
                warn!(query = %query.query_term, "Error updating last_scraped_at: {e}");
            }
        }

        info!(
            queries = report.queries_processed,
            failed = report.queries_failed,
            listings = report.listings_seen,
            persisted = report.listings_persisted,
            recorded = report.observations_recorded,
            persistence_failures = report.persistence_failures,
            "Scheduled run finished: {} queries, {} listings, {} new prices",
            report.queries_processed,
            report.listings_seen,
            report.observations_recorded,
        );
        self.health.run_finished(&report, now_ns());
        report
    }

    /// Aggregate, then resolve and record each listing as its own unit of work.
    /// Only pipeline-boundary failures are returned; per-listing persistence
    /// failures are counted and skipped.
    async fn process_query(&self, query: &TrackedQueryRow, report: &mut RunReport) -> Result<()> {
        let term = query.query_term.as_str();
        let listings = self.aggregator.search(term, &[]).await?;

        if listings.is_empty() {
            info!(query = %term, "No products found for \"{term}\"");
            return Ok(());
        }
        info!(query = %term, count = listings.len(), "Found {} listings for \"{term}\"", listings.len());

        for listing in &listings {
            report.listings_seen += 1;
            let row = match self.resolver.upsert(query.id, listing).await {
                Ok(row) => row,
                Err(e) => {
                    report.persistence_failures += 1;
                    warn!(
                        query = %term,
                        source = %listing.source_key,
                        url = %listing.canonical_url,
                        "Listing upsert failed: {e}",
                    );
                    continue;
                }
            };
            report.listings_persisted += 1;

            match self.ledger.record(&row, listing.price, &listing.currency).await {
                Ok(outcome) if outcome.recorded() => report.observations_recorded += 1,
                Ok(_) => {}
                Err(e) => {
                    report.persistence_failures += 1;
                    warn!(listing_id = row.id, "Error inserting new price for {}: {e}", row.display_name);
                }
            }
        }
        Ok(())
    }
}
