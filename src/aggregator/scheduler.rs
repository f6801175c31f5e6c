use chrono::{DateTime, SubsecRound, Utc};
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use super::period::format_period;
use super::persister::{persist_entry, PersistError};
use crate::feed::{parse_document, FetchError, Fetcher, ParseError, ParsedEntry};
use crate::storage::{Database, DatabaseError, Feed};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("time between requests must be greater than zero")]
    InvalidPeriod,
}

/// A cycle that ended before any entry was persisted.
///
/// None of these stop [`Scheduler::run`]; the next tick simply picks the next
/// stalest feed.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("no feeds available - add some feeds using the 'addfeed' command")]
    NoFeedsAvailable,
    #[error("error selecting next feed to fetch: {0}")]
    Select(#[source] DatabaseError),
    #[error("error marking feed {} as fetched: {source}", .feed.name)]
    MarkFetched { feed: Feed, source: DatabaseError },
    #[error("error fetching feed {} ({}): {source}", .feed.name, .feed.url)]
    Fetch { feed: Feed, source: FetchError },
    #[error("error parsing feed {} ({}): {source}", .feed.name, .feed.url)]
    Parse { feed: Feed, source: ParseError },
}

impl CycleError {
    /// Feed the cycle had selected, if it got that far.
    pub fn feed(&self) -> Option<&Feed> {
        match self {
            CycleError::NoFeedsAvailable | CycleError::Select(_) => None,
            CycleError::MarkFetched { feed, .. }
            | CycleError::Fetch { feed, .. }
            | CycleError::Parse { feed, .. } => Some(feed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

#[derive(Debug)]
pub enum EntryOutcome {
    Saved { post_id: i64 },
    DuplicateSkipped,
    Error(PersistError),
}

/// What happened to one entry of the fetched document.
#[derive(Debug)]
pub struct EntryReport {
    pub title: String,
    pub link: String,
    pub categories: Vec<String>,
    pub outcome: EntryOutcome,
}

/// Result of one completed cycle.
#[derive(Debug)]
pub struct CycleSummary {
    pub feed_id: i64,
    pub feed_name: String,
    pub feed_url: String,
    /// Refresh stamp written for the feed; millisecond precision
    pub started_at: DateTime<Utc>,
    /// Stamp the feed carried before this cycle
    pub previously_fetched_at: Option<DateTime<Utc>>,
    pub channel_title: String,
    pub items: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub entries: Vec<EntryReport>,
}

/// Drives the aggregation loop: one feed per tick, stalest first.
pub struct Scheduler {
    db: Database,
    fetcher: Fetcher,
    period: Duration,
    state: SchedulerState,
    cycles: u64,
}

impl Scheduler {
    pub fn new(db: Database, fetcher: Fetcher, period: Duration) -> Result<Self, SchedulerError> {
        if period.is_zero() {
            return Err(SchedulerError::InvalidPeriod);
        }
        Ok(Self {
            db,
            fetcher,
            period,
            state: SchedulerState::Idle,
            cycles: 0,
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Refresh the single stalest feed.
    ///
    /// The feed is stamped as fetched *before* the request goes out, so a feed
    /// that keeps failing still moves to the back of the queue instead of
    /// starving the others.
    pub async fn run_cycle(&mut self) -> Result<CycleSummary, CycleError> {
        self.state = SchedulerState::Running;
        self.cycles += 1;
        let result = self.cycle().await;
        self.state = SchedulerState::Idle;
        result
    }

    async fn cycle(&self) -> Result<CycleSummary, CycleError> {
        let feed = match self.db.select_next_feed_to_refresh().await {
            Ok(feed) => feed,
            Err(DatabaseError::NoFeedsAvailable) => return Err(CycleError::NoFeedsAvailable),
            Err(e) => return Err(CycleError::Select(e)),
        };

        let started_at = Utc::now().trunc_subsecs(3);
        print_feed_header(&feed, started_at);

        if let Err(source) = self.db.mark_feed_fetched(feed.id, started_at).await {
            return Err(CycleError::MarkFetched { feed, source });
        }

        let body = match self.fetcher.fetch(&feed.url).await {
            Ok(body) => body,
            Err(source) => {
                tracing::warn!(feed = %feed.url, error = %source, "Feed fetch failed");
                return Err(CycleError::Fetch { feed, source });
            }
        };

        let document = match parse_document(&body) {
            Ok(document) => document,
            Err(source) => {
                tracing::warn!(feed = %feed.url, error = %source, "Feed parse failed");
                return Err(CycleError::Parse { feed, source });
            }
        };

        println!(
            "Found {} posts in {}",
            document.entries.len(),
            display_title(&document.title, &feed.name)
        );

        let mut entries = Vec::with_capacity(document.entries.len());
        for (i, entry) in document.entries.iter().enumerate() {
            let report = self.persist(entry, feed.id).await;
            print_entry(i + 1, document.entries.len(), &report);
            entries.push(report);
        }

        let (mut saved, mut duplicates, mut errors) = (0, 0, 0);
        for report in &entries {
            match report.outcome {
                EntryOutcome::Saved { .. } => saved += 1,
                EntryOutcome::DuplicateSkipped => duplicates += 1,
                EntryOutcome::Error(_) => errors += 1,
            }
        }

        tracing::info!(
            feed = %feed.url,
            items = entries.len(),
            saved,
            duplicates,
            errors,
            "Aggregation cycle complete"
        );

        Ok(CycleSummary {
            feed_id: feed.id,
            feed_name: feed.name,
            feed_url: feed.url,
            started_at,
            previously_fetched_at: feed.last_fetched_at,
            channel_title: document.title,
            items: entries.len(),
            saved,
            duplicates,
            errors,
            entries,
        })
    }

    async fn persist(&self, entry: &ParsedEntry, feed_id: i64) -> EntryReport {
        let outcome = match persist_entry(&self.db, entry, feed_id).await {
            Ok(post) => EntryOutcome::Saved { post_id: post.id },
            Err(PersistError::Duplicate { .. }) => EntryOutcome::DuplicateSkipped,
            Err(e) => {
                tracing::debug!(link = %entry.link, error = %e, "Entry not saved");
                EntryOutcome::Error(e)
            }
        };
        EntryReport {
            title: entry.title.clone(),
            link: entry.link.clone(),
            categories: entry.categories.clone(),
            outcome,
        }
    }

    /// Run cycles forever, one per period. The first cycle starts immediately.
    ///
    /// A tick that falls due while a cycle is still running is pushed back
    /// rather than fired in a burst.
    pub async fn run(&mut self) {
        println!("Collecting feeds every {}", format_period(self.period));

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            println!();
            println!("=== Aggregation cycle #{} ===", self.cycles + 1);

            match self.run_cycle().await {
                Ok(summary) => print_summary(&summary),
                Err(e) => {
                    println!("{}", e);
                    println!("Will try again on next tick");
                }
            }

            println!("Waiting {} until next fetch...", format_period(self.period));
        }
    }
}

fn display_title<'a>(title: &'a str, fallback: &'a str) -> &'a str {
    let title = title.trim();
    if title.is_empty() {
        fallback
    } else {
        title
    }
}

fn print_feed_header(feed: &Feed, now: DateTime<Utc>) {
    println!("Fetching feed: {} ({})", feed.name, feed.url);
    match feed.last_fetched_at {
        Some(at) => println!(
            "Last fetched: {} ({} minutes ago)",
            at.format("%Y-%m-%d %H:%M:%S UTC"),
            (now - at).num_minutes()
        ),
        None => println!("Last fetched: never"),
    }
}

fn print_entry(index: usize, total: usize, report: &EntryReport) {
    println!("{}", entry_line(index, total, report));
    if let Some(line) = categories_line(&report.categories) {
        println!("{}", line);
    }
}

fn entry_line(index: usize, total: usize, report: &EntryReport) -> String {
    let label = display_title(&report.title, &report.link);
    match &report.outcome {
        EntryOutcome::Saved { .. } => format!("[{}/{}] Saved: {}", index, total, label),
        EntryOutcome::DuplicateSkipped => format!("[{}/{}] Already saved: {}", index, total, label),
        EntryOutcome::Error(e) => format!("[{}/{}] Skipped {}: {}", index, total, label, e),
    }
}

fn categories_line(categories: &[String]) -> Option<String> {
    let labels: Vec<&str> = categories
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if labels.is_empty() {
        None
    } else {
        Some(format!("    Categories: {}", labels.join(", ")))
    }
}

fn print_summary(summary: &CycleSummary) {
    println!(
        "Saved {} of {} posts from {} ({} duplicates, {} errors)",
        summary.saved, summary.items, summary.feed_name, summary.duplicates, summary.errors
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Example</title>
<item><title>One</title><link>https://example.com/1</link></item>
<item><title></title><link>https://example.com/2</link></item>
</channel></rss>"#;

    fn fetcher() -> Fetcher {
        Fetcher::new("gator-test", Duration::from_secs(5), 1024 * 1024).unwrap()
    }

    async fn scheduler() -> Scheduler {
        let db = Database::open(":memory:").await.unwrap();
        Scheduler::new(db, fetcher(), Duration::from_secs(60)).unwrap()
    }

    #[tokio::test]
    async fn test_zero_period_rejected() {
        let db = Database::open(":memory:").await.unwrap();
        let result = Scheduler::new(db, fetcher(), Duration::ZERO);
        assert_eq!(result.err(), Some(SchedulerError::InvalidPeriod));
    }

    #[tokio::test]
    async fn test_starts_idle_and_returns_to_idle() {
        let mut scheduler = scheduler().await;
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let result = scheduler.run_cycle().await;
        assert!(matches!(result, Err(CycleError::NoFeedsAvailable)));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.cycles(), 1);
    }

    #[tokio::test]
    async fn test_cycle_classifies_entries() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&mock_server)
            .await;

        let mut scheduler = scheduler().await;
        let user = scheduler.db.create_user("alice").await.unwrap();
        let feed = scheduler
            .db
            .create_feed("Example", &format!("{}/rss", mock_server.uri()), user.id)
            .await
            .unwrap();

        let summary = scheduler.run_cycle().await.unwrap();
        assert_eq!(summary.feed_id, feed.id);
        assert_eq!(summary.channel_title, "Example");
        assert!(summary.previously_fetched_at.is_none());
        assert_eq!(summary.items, 2);
        assert_eq!(summary.saved, 1);
        assert_eq!(summary.errors, 1);
        assert!(matches!(
            summary.entries[1].outcome,
            EntryOutcome::Error(PersistError::MissingTitle)
        ));

        // Same document again: everything already stored
        let summary = scheduler.run_cycle().await.unwrap();
        assert_eq!(summary.saved, 0);
        assert_eq!(summary.duplicates, 1);
        assert!(summary.previously_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_parse_failure_reports_feed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&mock_server)
            .await;

        let mut scheduler = scheduler().await;
        let user = scheduler.db.create_user("alice").await.unwrap();
        scheduler
            .db
            .create_feed("Broken", &format!("{}/rss", mock_server.uri()), user.id)
            .await
            .unwrap();

        let err = scheduler.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Parse { .. }));
        assert_eq!(err.feed().map(|f| f.name.as_str()), Some("Broken"));
        assert!(err.to_string().contains("Broken"));
    }

    #[test]
    fn test_entry_progress_lines() {
        let report = EntryReport {
            title: "One".to_string(),
            link: "https://example.com/1".to_string(),
            categories: vec!["rust".to_string(), " ".to_string(), "web".to_string()],
            outcome: EntryOutcome::Saved { post_id: 1 },
        };
        assert_eq!(entry_line(1, 3, &report), "[1/3] Saved: One");
        assert_eq!(
            categories_line(&report.categories).as_deref(),
            Some("    Categories: rust, web")
        );
        assert_eq!(categories_line(&[]), None);
    }

    #[test]
    fn test_display_title_fallback() {
        assert_eq!(display_title("  ", "https://example.com"), "https://example.com");
        assert_eq!(display_title(" Title ", "x"), "Title");
    }
}
