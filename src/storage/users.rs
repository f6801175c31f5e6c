use chrono::Utc;

use super::schema::Database;
use super::types::{DatabaseError, User, UserRow};

impl Database {
    // ========================================================================
    // User Operations
    // ========================================================================

    /// Register a new user. Fails if the name is already taken.
    pub async fn create_user(&self, name: &str) -> Result<User, DatabaseError> {
        let now = Utc::now().timestamp();
        let row: UserRow = sqlx::query_as(
            "INSERT INTO users (name, created_at) VALUES (?, ?) RETURNING id, name, created_at",
        )
        .bind(name)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_user())
    }

    pub async fn get_user_by_name(&self, name: &str) -> Result<User, DatabaseError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, name, created_at FROM users WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        row.map(UserRow::into_user)
            .ok_or_else(|| DatabaseError::UserNotFound(name.to_string()))
    }

    /// All registered users, ordered by name
    pub async fn get_users(&self) -> Result<Vec<User>, DatabaseError> {
        let rows: Vec<UserRow> =
            sqlx::query_as("SELECT id, name, created_at FROM users ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(UserRow::into_user).collect())
    }

    /// Delete every user. Their feeds, follows and posts go with them
    /// through the foreign-key cascades.
    ///
    /// Returns the number of users removed.
    pub async fn delete_all_users(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError, NewPost};

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let db = Database::open(":memory:").await.unwrap();
        let created = db.create_user("alice").await.unwrap();

        let found = db.get_user_by_name("alice").await.unwrap();
        assert_eq!(created, found);
    }

    #[tokio::test]
    async fn test_duplicate_user_name_rejected() {
        let db = Database::open(":memory:").await.unwrap();
        db.create_user("alice").await.unwrap();
        assert!(db.create_user("alice").await.is_err());
    }

    #[tokio::test]
    async fn test_users_listed_by_name() {
        let db = Database::open(":memory:").await.unwrap();
        db.create_user("kahya").await.unwrap();
        db.create_user("holgith").await.unwrap();

        let names: Vec<String> = db
            .get_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["holgith", "kahya"]);
    }

    #[tokio::test]
    async fn test_reset_cascades_to_feeds_and_posts() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = db.create_user("alice").await.unwrap();
        let bob = db.create_user("bob").await.unwrap();
        let feed = db
            .create_feed("Blog", "https://blog.example.com/rss", alice.id)
            .await
            .unwrap();
        db.follow_feed(bob.id, feed.id).await.unwrap();
        db.insert_post(&NewPost {
            title: "Hello".to_string(),
            url: "https://blog.example.com/hello".to_string(),
            description: None,
            published_at: None,
            feed_id: feed.id,
        })
        .await
        .unwrap();

        assert_eq!(db.delete_all_users().await.unwrap(), 2);

        assert!(db.get_users().await.unwrap().is_empty());
        assert!(db.get_feeds().await.unwrap().is_empty());
        assert!(db.get_posts_for_feed(feed.id).await.unwrap().is_empty());

        // Names are free again
        db.create_user("alice").await.unwrap();
        assert_eq!(db.delete_all_users().await.unwrap(), 1);
        assert_eq!(db.delete_all_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let db = Database::open(":memory:").await.unwrap();
        match db.get_user_by_name("nobody").await {
            Err(DatabaseError::UserNotFound(name)) => assert_eq!(name, "nobody"),
            other => panic!("Expected UserNotFound, got {:?}", other),
        }
    }
}
