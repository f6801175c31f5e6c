use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::feed::{normalize_date, ParsedEntry};
use crate::storage::{Database, DatabaseError, NewPost, Post};

/// Why an entry did not become a new post.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("post has no URL")]
    MissingUrl,
    #[error("post has no title")]
    MissingTitle,
    /// Another post already owns this URL. Not a failure: the entry was
    /// ingested on an earlier cycle or by another feed.
    #[error("post already exists: {url}")]
    Duplicate { url: String },
    #[error("error saving post: {0}")]
    Database(#[source] DatabaseError),
}

impl From<DatabaseError> for PersistError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Duplicate { url } => PersistError::Duplicate { url },
            other => PersistError::Database(other),
        }
    }
}

/// Store one parsed entry as a post of `feed_id`.
///
/// Checks run in order: link, then title. An entry is never rejected for its
/// date: a missing or unrecognized `pubDate` becomes the current time.
///
/// Duplicates are detected by the insert itself (see
/// [`Database::insert_post`]), never by a lookup beforehand.
pub async fn persist_entry(
    db: &Database,
    entry: &ParsedEntry,
    feed_id: i64,
) -> Result<Post, PersistError> {
    let url = entry.link.trim();
    if url.is_empty() {
        return Err(PersistError::MissingUrl);
    }

    let title = entry.title.trim();
    if title.is_empty() {
        return Err(PersistError::MissingTitle);
    }

    let description = Some(entry.description.trim())
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    let post = NewPost {
        title: title.to_string(),
        url: url.to_string(),
        description,
        published_at: Some(resolve_published_at(&entry.pub_date, Utc::now())),
        feed_id,
    };

    Ok(db.insert_post(&post).await?)
}

/// Publish time for an entry, falling back to `now`.
pub(crate) fn resolve_published_at(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    if raw.trim().is_empty() {
        return now;
    }

    match normalize_date(raw) {
        Ok(published) => published,
        Err(e) => {
            tracing::warn!(date = %raw, error = %e, "Unrecognized publish date, using current time");
            now
        }
    }
}
