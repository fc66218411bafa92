use crate::db::models::TrackedQueryRow;
use crate::db::now_ns;
use crate::error::{AppError, Result};

const COLUMNS: &str = "id, query_term, description, is_active, created_at, last_scraped_at";

/// Persisted search terms the scheduler re-runs.
#[derive(Clone)]
pub struct TrackedQueryStore {
    pool: sqlx::SqlitePool,
}

impl TrackedQueryStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// New queries start active. A term already tracked is `Conflict`.
    pub async fn create(&self, query_term: &str, description: Option<&str>) -> Result<TrackedQueryRow> {
        let term = query_term.trim();
        if term.is_empty() {
            return Err(AppError::Validation("query_term is required".to_string()));
        }

        let sql = format!(
            "INSERT INTO tracked_queries (query_term, description, is_active, created_at) \
             VALUES (?, ?, 1, ?) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TrackedQueryRow>(&sql)
            .bind(term)
            .bind(description)
            .bind(now_ns())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                let err = AppError::from(e);
                if err.is_unique_violation() {
                    AppError::Conflict("This product query is already being tracked.".to_string())
                } else {
                    err
                }
            })
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<TrackedQueryRow>> {
        let sql = format!("SELECT {COLUMNS} FROM tracked_queries ORDER BY created_at DESC, id DESC");
        Ok(sqlx::query_as::<_, TrackedQueryRow>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Active queries in registration order.
    pub async fn list_active(&self) -> Result<Vec<TrackedQueryRow>> {
        let sql = format!("SELECT {COLUMNS} FROM tracked_queries WHERE is_active = 1 ORDER BY id ASC");
        Ok(sqlx::query_as::<_, TrackedQueryRow>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get(&self, id: i64) -> Result<TrackedQueryRow> {
        let sql = format!("SELECT {COLUMNS} FROM tracked_queries WHERE id = ?");
        sqlx::query_as::<_, TrackedQueryRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tracked product {id}")))
    }

    /// `None` leaves a field unchanged; at least one field must be given.
    pub async fn update(
        &self,
        id: i64,
        description: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<TrackedQueryRow> {
        if description.is_none() && is_active.is_none() {
            return Err(AppError::Validation("No update fields provided.".to_string()));
        }

        let sql = format!(
            "UPDATE tracked_queries \
             SET description = COALESCE(?, description), is_active = COALESCE(?, is_active) \
             WHERE id = ? RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TrackedQueryRow>(&sql)
            .bind(description)
            .bind(is_active)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tracked product {id}")))
    }

    /// Cascades to the query's listings and their price history.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM tracked_queries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Tracked product {id}")));
        }
        Ok(())
    }

    pub async fn mark_scraped(&self, id: i64, at_ns: i64) -> Result<()> {
        sqlx::query("UPDATE tracked_queries SET last_scraped_at = ? WHERE id = ?")
            .bind(at_ns)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn create_list_and_conflict() {
        let store = TrackedQueryStore::new(memory_pool().await);

        let q = store.create("  usb hub ", Some("office")).await.expect("created");
        assert_eq!(q.query_term, "usb hub");
        assert!(q.is_active);
        assert_eq!(q.last_scraped_at, None);

        let dup = store.create("usb hub", None).await;
        assert!(matches!(dup, Err(AppError::Conflict(_))), "{dup:?}");

        assert!(matches!(store.create("   ", None).await, Err(AppError::Validation(_))));

        store.create("ssd 1tb", None).await.expect("created");
        let terms: Vec<String> = store.list().await.expect("list").into_iter().map(|q| q.query_term).collect();
        assert_eq!(terms, vec!["ssd 1tb", "usb hub"]);
    }

    #[tokio::test]
    async fn update_toggles_active_and_reports_not_found() {
        let store = TrackedQueryStore::new(memory_pool().await);
        let q = store.create("usb hub", Some("old")).await.expect("created");

        let updated = store.update(q.id, None, Some(false)).await.expect("updated");
        assert!(!updated.is_active);
        assert_eq!(updated.description.as_deref(), Some("old"));
        assert!(store.list_active().await.expect("list").is_empty());

        let updated = store.update(q.id, Some("new"), None).await.expect("updated");
        assert_eq!(updated.description.as_deref(), Some("new"));
        assert!(!updated.is_active);

        assert!(matches!(store.update(q.id, None, None).await, Err(AppError::Validation(_))));
        assert!(matches!(store.update(999, None, Some(true)).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_and_mark_scraped() {
        let store = TrackedQueryStore::new(memory_pool().await);
        let q = store.create("usb hub", None).await.expect("created");

        store.mark_scraped(q.id, 42).await.expect("marked");
        assert_eq!(store.get(q.id).await.expect("exists").last_scraped_at, Some(42));

        store.delete(q.id).await.expect("deleted");
        assert!(matches!(store.delete(q.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(store.get(q.id).await, Err(AppError::NotFound(_))));
    }
}
