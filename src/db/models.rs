//! Row types for the schema in `migrations/`. Timestamps are nanoseconds since
//! the Unix epoch (UTC).

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TrackedQueryRow {
    pub id: i64,
    pub query_term: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub last_scraped_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ListingRow {
    pub id: i64,
    pub tracked_query: i64,
    pub source_key: String,
    pub display_name: String,
    pub canonical_url: String,
    pub image_url: Option<String>,
    pub last_updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PriceObservationRow {
    pub id: i64,
    pub listing: i64,
    pub price: f64,
    pub currency: String,
    pub observed_at: i64,
}

/// A listing with its most recent observation, if any.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ListingSnapshotRow {
    pub id: i64,
    pub source_key: String,
    pub display_name: String,
    pub canonical_url: String,
    pub image_url: Option<String>,
    pub latest_price: Option<f64>,
    pub currency: Option<String>,
    pub last_price_update: Option<i64>,
}
