use tracing::{info, warn};

use crate::db::models::{ListingRow, PriceObservationRow};
use crate::db::now_ns;
use crate::error::Result;

/// What the latest-observation lookup produced.
#[derive(Debug)]
pub enum PriorLookup {
    Found(PriceObservationRow),
    Absent,
    /// The lookup itself failed. Treated as "record anyway".
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerOutcome {
    FirstObservation,
    Changed { previous_price: f64, previous_currency: String },
    /// Recorded because the prior observation could not be read.
    RecordedBlind,
    Unchanged,
}

impl LedgerOutcome {
    pub fn recorded(&self) -> bool {
        !matches!(self, LedgerOutcome::Unchanged)
    }
}

/// Append-only price history. A new observation is written only when the
/// `(price, currency)` pair differs from the latest one for the listing.
///
/// The read and the conditional insert are not atomic. Two concurrent writers
/// can at worst both insert the same new price; a change is never dropped.
#[derive(Clone)]
pub struct PriceLedger {
    pool: sqlx::SqlitePool,
}

impl PriceLedger {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn latest(&self, listing_id: i64) -> Result<Option<PriceObservationRow>> {
        let row = sqlx::query_as::<_, PriceObservationRow>(
            "SELECT id, listing, price, currency, observed_at FROM price_observations \
             WHERE listing = ? ORDER BY observed_at DESC, id DESC LIMIT 1",
        )
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Oldest first.
    pub async fn history(&self, listing_id: i64) -> Result<Vec<PriceObservationRow>> {
        let rows = sqlx::query_as::<_, PriceObservationRow>(
            "SELECT id, listing, price, currency, observed_at FROM price_observations \
             WHERE listing = ? ORDER BY observed_at ASC, id ASC",
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn record(&self, listing: &ListingRow, price: f64, currency: &str) -> Result<LedgerOutcome> {
        let prior = match self.latest(listing.id).await {
            Ok(Some(row)) => PriorLookup::Found(row),
            Ok(None) => PriorLookup::Absent,
            Err(e) => {
                warn!(
                    listing_id = listing.id,
                    "[LEDGER] latest price lookup failed for {} (#{}): {e}; recording anyway",
                    listing.display_name,
                    listing.id,
                );
                PriorLookup::Failed
            }
        };
        self.apply(listing, price, currency, prior).await
    }

    pub(crate) async fn apply(
        &self,
        listing: &ListingRow,
        price: f64,
        currency: &str,
        prior: PriorLookup,
    ) -> Result<LedgerOutcome> {
        let now = now_ns();
        let (outcome, observed_at) = decide(&prior, price, currency, now);

        if outcome == LedgerOutcome::Unchanged {
            return Ok(outcome);
        }
        match &outcome {
            LedgerOutcome::FirstObservation => info!(
                listing_id = listing.id,
                "[LEDGER] first price for {} (#{}): {price} {currency}",
                listing.display_name,
                listing.id,
            ),
            LedgerOutcome::Changed { previous_price, previous_currency } => info!(
                listing_id = listing.id,
                "[LEDGER] price change for {} (#{}): {previous_price} {previous_currency} -> {price} {currency}",
                listing.display_name,
                listing.id,
            ),
            LedgerOutcome::RecordedBlind | LedgerOutcome::Unchanged => {}
        }

        sqlx::query("INSERT INTO price_observations (listing, price, currency, observed_at) VALUES (?, ?, ?, ?)")
            .bind(listing.id)
            .bind(price)
            .bind(currency)
            .bind(observed_at)
            .execute(&self.pool)
            .await?;
        Ok(outcome)
    }
}

/// Decide whether to record, and with which timestamp. Equality is exact on
/// the bit pattern of the price. The timestamp is pushed past the prior one so
/// a listing's history stays strictly ordered under a coarse clock.
pub fn decide(prior: &PriorLookup, price: f64, currency: &str, now: i64) -> (LedgerOutcome, i64) {
    match prior {
        PriorLookup::Absent => (LedgerOutcome::FirstObservation, now),
        PriorLookup::Failed => (LedgerOutcome::RecordedBlind, now),
        PriorLookup::Found(p) if p.price.to_bits() == price.to_bits() && p.currency == currency => {
            (LedgerOutcome::Unchanged, p.observed_at)
        }
        PriorLookup::Found(p) => (
            LedgerOutcome::Changed {
                previous_price: p.price,
                previous_currency: p.currency.clone(),
            },
            now.max(p.observed_at.saturating_add(1)),
        ),
    }
}
