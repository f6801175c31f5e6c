use chrono::Utc;

use super::schema::Database;
use super::types::{from_unix, DatabaseError, FeedFollow};

type FollowRow = (i64, i64, i64, String, i64);

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Subscribe a user to a feed.
    ///
    /// Following the same feed twice is a no-op; returns `true` only when a
    /// new follow row was created.
    pub async fn follow_feed(&self, user_id: i64, feed_id: i64) -> Result<bool, DatabaseError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO feed_follows (user_id, feed_id, created_at) VALUES (?, ?, ?)
             ON CONFLICT(user_id, feed_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(feed_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn get_follows_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<FeedFollow>, DatabaseError> {
        let rows: Vec<FollowRow> = sqlx::query_as(
            r#"
                SELECT ff.id, ff.user_id, ff.feed_id, f.name, ff.created_at
                FROM feed_follows ff
                JOIN feeds f ON f.id = ff.feed_id
                WHERE ff.user_id = ?
                ORDER BY f.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, user_id, feed_id, feed_name, created_at)| FeedFollow {
                id,
                user_id,
                feed_id,
                feed_name,
                created_at: from_unix(created_at),
            })
            .collect())
    }
}
