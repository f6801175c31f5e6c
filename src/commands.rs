//! Feed registration and subscription as run by the `addfeed` and `follow`
//! subcommands.
//!
//! Both normalise the URL argument with [`validate_feed_url`] before it
//! touches the store, so a feed added as `https://example.com` can be
//! followed by the same spelling even though it is stored as
//! `https://example.com/`.

use thiserror::Error;

use crate::storage::{Database, DatabaseError, Feed, User};
use crate::util::{validate_feed_url, UrlValidationError};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    #[error("no feed registered with URL {0}")]
    UnknownFeed(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Register a feed owned by `user` and subscribe them to it.
pub async fn add_feed(
    db: &Database,
    user: &User,
    name: &str,
    raw_url: &str,
) -> Result<Feed, CommandError> {
    let url = validate_feed_url(raw_url)?;
    let feed = db.create_feed(name, url.as_str(), user.id).await?;
    db.follow_feed(user.id, feed.id).await?;
    tracing::info!(feed_id = feed.id, url = %feed.url, user = %user.name, "Feed added");
    Ok(feed)
}

/// Subscribe `user` to an already registered feed.
///
/// Returns the feed and whether a new follow was created (`false` when the
/// user already followed it).
pub async fn follow_by_url(
    db: &Database,
    user: &User,
    raw_url: &str,
) -> Result<(Feed, bool), CommandError> {
    let url = validate_feed_url(raw_url)?;
    let feed = db
        .get_feed_by_url(url.as_str())
        .await?
        .ok_or_else(|| CommandError::UnknownFeed(url.to_string()))?;
    let created = db.follow_feed(user.id, feed.id).await?;
    Ok((feed, created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn setup() -> (Database, User) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("lane").await.unwrap();
        (db, user)
    }

    #[tokio::test]
    async fn test_add_feed_stores_normalised_url_and_follows() {
        let (db, user) = setup().await;
        let feed = add_feed(&db, &user, "Hacker News", " https://news.ycombinator.com ")
            .await
            .unwrap();

        assert_eq!(feed.url, "https://news.ycombinator.com/");
        let follows = db.get_follows_for_user(user.id).await.unwrap();
        assert_eq!(follows.len(), 1);
        assert_eq!(follows[0].feed_id, feed.id);
    }

    #[tokio::test]
    async fn test_follow_accepts_same_spelling_as_addfeed() {
        let (db, owner) = setup().await;
        let feed = add_feed(&db, &owner, "HN", "https://news.ycombinator.com")
            .await
            .unwrap();
        let reader = db.create_user("kahya").await.unwrap();

        let (followed, created) = follow_by_url(&db, &reader, "https://news.ycombinator.com")
            .await
            .unwrap();
        assert_eq!(followed.id, feed.id);
        assert!(created);

        // Stored spelling and a differently cased host resolve to the same feed
        let (again, created) = follow_by_url(&db, &reader, "HTTPS://News.YCombinator.com/")
            .await
            .unwrap();
        assert_eq!(again.id, feed.id);
        assert!(!created);
    }

    #[tokio::test]
    async fn test_follow_unknown_feed() {
        let (db, user) = setup().await;
        match follow_by_url(&db, &user, "https://nowhere.example.com/rss").await {
            Err(CommandError::UnknownFeed(url)) => {
                assert_eq!(url, "https://nowhere.example.com/rss")
            }
            other => panic!("Expected UnknownFeed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_store() {
        let (db, user) = setup().await;
        assert!(matches!(
            add_feed(&db, &user, "Local", "file:///etc/passwd").await,
            Err(CommandError::InvalidUrl(_))
        ));
        assert!(matches!(
            follow_by_url(&db, &user, "not a url").await,
            Err(CommandError::InvalidUrl(_))
        ));
        assert!(db.get_feeds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_feed_url_rejected() {
        let (db, user) = setup().await;
        add_feed(&db, &user, "One", "https://blog.example.com/rss")
            .await
            .unwrap();
        assert!(matches!(
            add_feed(&db, &user, "Two", "https://blog.example.com/rss").await,
            Err(CommandError::Database(_))
        ));
    }
}
