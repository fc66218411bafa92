use crate::db::models::{ListingRow, ListingSnapshotRow};
use crate::db::now_ns;
use crate::error::{AppError, Result};
use crate::types::Listing;

/// Maps `(canonical_url, source_key)` onto a stable listing id.
#[derive(Clone)]
pub struct ListingResolver {
    pool: sqlx::SqlitePool,
}

impl ListingResolver {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the listing, or refresh `display_name`, `image_url` and
    /// `last_updated_at` of the existing row. The id and the owning tracked
    /// query of an existing row never change.
    pub async fn upsert(&self, tracked_query: i64, listing: &Listing) -> Result<ListingRow> {
        let row = sqlx::query_as::<_, ListingRow>(
            r#"
            INSERT INTO listings (tracked_query, source_key, display_name, canonical_url, image_url, last_updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(canonical_url, source_key) DO UPDATE SET
                display_name = excluded.display_name,
                image_url = excluded.image_url,
                last_updated_at = excluded.last_updated_at
            RETURNING id, tracked_query, source_key, display_name, canonical_url, image_url, last_updated_at
            "#,
        )
        .bind(tracked_query)
        .bind(&listing.source_key)
        .bind(&listing.display_name)
        .bind(&listing.canonical_url)
        .bind(&listing.image_url)
        .bind(now_ns())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get(&self, id: i64) -> Result<ListingRow> {
        sqlx::query_as::<_, ListingRow>(
            "SELECT id, tracked_query, source_key, display_name, canonical_url, image_url, last_updated_at \
             FROM listings WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listing {id}")))
    }

    /// Every listing under a tracked query term with its latest observation.
    ///
    /// A listing belongs to the query that first scraped it. When a later query
    /// finds the same `(canonical_url, source_key)` it refreshes that row, and the
    /// listing stays under the first query's snapshot only.
    pub async fn snapshot_for_term(&self, query_term: &str) -> Result<Vec<ListingSnapshotRow>> {
        let rows = sqlx::query_as::<_, ListingSnapshotRow>(
            r#"
            SELECT l.id, l.source_key, l.display_name, l.canonical_url, l.image_url,
                   p.price AS latest_price, p.currency AS currency, p.observed_at AS last_price_update
            FROM listings l
            JOIN tracked_queries t ON t.id = l.tracked_query
            LEFT JOIN price_observations p ON p.id = (
                SELECT p2.id FROM price_observations p2
                WHERE p2.listing = l.id
                ORDER BY p2.observed_at DESC, p2.id DESC
                LIMIT 1
            )
            WHERE t.query_term = ?
            ORDER BY l.source_key ASC, l.id ASC
            "#,
        )
        .bind(query_term.trim())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
