use chrono::Utc;

use super::schema::Database;
use super::types::{DatabaseError, FeedPost, FeedPostRow, NewPost, Post, PostRow};

/// Maximum number of posts returned by a single browse query
const MAX_POSTS: i64 = 500;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post, detecting duplicates atomically.
    ///
    /// Uses `ON CONFLICT(url) DO NOTHING RETURNING`, so the uniqueness check
    /// and the write are one statement. Concurrent aggregators racing on the
    /// same URL end up with exactly one row and the loser sees `Duplicate`.
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::Duplicate`] if a post with this URL already exists
    /// - [`DatabaseError::Other`] for constraint or I/O failures
    pub async fn insert_post(&self, post: &NewPost) -> Result<Post, DatabaseError> {
        let now = Utc::now().timestamp();
        let row: Option<PostRow> = sqlx::query_as(
            r#"
            INSERT INTO posts (title, url, description, published_at, feed_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            RETURNING id, title, url, description, published_at, feed_id, created_at
        "#,
        )
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at.map(|t| t.timestamp()))
        .bind(post.feed_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PostRow::into_post)
            .ok_or_else(|| DatabaseError::Duplicate {
                url: post.url.clone(),
            })
    }

    /// Newest posts from the feeds a user follows
    pub async fn get_posts_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<FeedPost>, DatabaseError> {
        let limit = limit.clamp(0, MAX_POSTS);
        let rows: Vec<FeedPostRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.title, p.url, p.description, p.published_at, p.feed_id,
                   p.created_at, f.name AS feed_name
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            JOIN feeds f ON f.id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC, p.id DESC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| FeedPost {
                post: row.post.into_post(),
                feed_name: row.feed_name,
            })
            .collect())
    }

    /// All posts of one feed in insertion order
    pub async fn get_posts_for_feed(&self, feed_id: i64) -> Result<Vec<Post>, DatabaseError> {
        let rows: Vec<PostRow> = sqlx::query_as(
            r#"
            SELECT id, title, url, description, published_at, feed_id, created_at
            FROM posts
            WHERE feed_id = ?
            ORDER BY id
        "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PostRow::into_post).collect())
    }
}
