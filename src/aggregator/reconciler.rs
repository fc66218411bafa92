use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::aggregator::fanout::SourceOutcome;
use crate::types::Listing;

/// Merges per-source settlements into one ordered list.
///
/// Order: source priority rank first, price ascending second. Sources missing
/// from the priority list rank after every listed one and keep their relative
/// settlement order. Missing or non-finite prices sort last within a bucket.
#[derive(Debug, Clone)]
pub struct Reconciler {
    priority: Vec<String>,
    default_currency: String,
}

impl Reconciler {
    pub fn new(priority: Vec<String>, default_currency: impl Into<String>) -> Self {
        Self {
            priority,
            default_currency: default_currency.into(),
        }
    }

    fn rank(&self, key: &str, settlement_idx: usize) -> usize {
        self.priority
            .iter()
            .position(|p| p == key)
            .unwrap_or(self.priority.len() + settlement_idx)
    }

    pub fn reconcile(&self, term: &str, outcomes: Vec<SourceOutcome>) -> Vec<Listing> {
        let mut ranked: Vec<(usize, Listing)> = Vec::new();

        for (idx, outcome) in outcomes.into_iter().enumerate() {
            let raw = match outcome.result {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(source = %outcome.key, query = %term, "Scraper for {} failed: {e}", outcome.key);
                    continue;
                }
            };

            let rank = self.rank(&outcome.key, idx);
            let total = raw.len();
            let before = ranked.len();
            ranked.extend(
                raw.into_iter()
                    .filter_map(|r| r.into_listing(&outcome.key, &self.default_currency))
                    .map(|l| (rank, l)),
            );
            let kept = ranked.len() - before;
            if kept < total {
                debug!(
                    source = %outcome.key,
                    dropped = total - kept,
                    "Dropped {} invalid listings from {}",
                    total - kept,
                    outcome.key,
                );
            }
        }

        // stable: equal (rank, price) keep settlement order
        ranked.sort_by(|(ra, a), (rb, b)| ra.cmp(rb).then_with(|| cmp_price(a.price, b.price)));
        ranked.into_iter().map(|(_, l)| l).collect()
    }
}

fn price_key(p: f64) -> f64 {
    if p.is_finite() && p > 0.0 {
        p
    } else {
        f64::INFINITY
    }
}

fn cmp_price(a: f64, b: f64) -> Ordering {
    price_key(a).total_cmp(&price_key(b))
}
