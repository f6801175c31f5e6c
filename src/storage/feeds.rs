use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedRow};

const FEED_COLUMNS: &str = "id, name, url, user_id, created_at, last_fetched_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a feed owned by `user_id`. The URL must not already be registered.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
    ) -> Result<Feed, DatabaseError> {
        let now = Utc::now().timestamp();
        let row: FeedRow = sqlx::query_as(&format!(
            "INSERT INTO feeds (name, url, user_id, created_at) VALUES (?, ?, ?, ?) RETURNING {}",
            FEED_COLUMNS
        ))
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_feed())
    }

    /// All registered feeds, ordered by name
    pub async fn get_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let rows: Vec<FeedRow> = sqlx::query_as(&format!(
            "SELECT {} FROM feeds ORDER BY name, id",
            FEED_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FeedRow::into_feed).collect())
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let row: Option<FeedRow> =
            sqlx::query_as(&format!("SELECT {} FROM feeds WHERE url = ?", FEED_COLUMNS))
                .bind(url)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(FeedRow::into_feed))
    }

    pub async fn get_feed(&self, feed_id: i64) -> Result<Feed, DatabaseError> {
        let row: Option<FeedRow> =
            sqlx::query_as(&format!("SELECT {} FROM feeds WHERE id = ?", FEED_COLUMNS))
                .bind(feed_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(FeedRow::into_feed)
            .ok_or(DatabaseError::FeedNotFound(feed_id))
    }

    // ========================================================================
    // Refresh Scheduling
    // ========================================================================

    /// Pick the stalest feed.
    ///
    /// Feeds that were never fetched come first, then the oldest
    /// `last_fetched_at`. Equal stamps fall back to ascending id so the choice
    /// is deterministic. Every registered feed is eligible, followed or not.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::NoFeedsAvailable`] when no feed is registered.
    pub async fn select_next_feed_to_refresh(&self) -> Result<Feed, DatabaseError> {
        let row: Option<FeedRow> = sqlx::query_as(&format!(
            "SELECT {} FROM feeds ORDER BY last_fetched_at ASC NULLS FIRST, id ASC LIMIT 1",
            FEED_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;
        row.map(FeedRow::into_feed)
            .ok_or(DatabaseError::NoFeedsAvailable)
    }

    /// Stamp a feed as refreshed at `at`, kept to millisecond precision.
    ///
    /// A single self-contained UPDATE; it is not part of any wider transaction.
    pub async fn mark_feed_fetched(
        &self,
        feed_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE feeds SET last_fetched_at = ? WHERE id = ?")
            .bind(at.timestamp_millis())
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::FeedNotFound(feed_id));
        }
        Ok(())
    }
}
