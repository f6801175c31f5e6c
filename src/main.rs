use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use gator::aggregator::{format_period, parse_period, Scheduler};
use gator::commands::{add_feed, follow_by_url};
use gator::config::Config;
use gator::feed::Fetcher;
use gator::storage::{Database, DatabaseError, User};
use gator::util::{clean_line, truncate_to_width};

/// Posts shown by `browse` when no limit is given
const DEFAULT_BROWSE_LIMIT: i64 = 2;
/// Display columns of post description shown by `browse`
const DESCRIPTION_WIDTH: usize = 100;

/// Get the config directory path (~/.config/gator/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("gator"))
}

#[derive(Parser, Debug)]
#[command(name = "gator", about = "Feed aggregator: collects RSS posts into SQLite")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh feeds forever, one feed per interval (e.g. 30s, 1m, 1h30m)
    Agg {
        #[arg(value_name = "TIME_BETWEEN_REQS", value_parser = parse_period)]
        time_between_reqs: Duration,
    },
    /// Create a user and log in as them
    Register { name: String },
    /// Switch to an existing user
    Login { name: String },
    /// List registered users, marking the current one
    Users,
    /// Delete every user along with their feeds, follows and posts
    Reset,
    /// Add a feed for the current user and follow it
    Addfeed { name: String, url: String },
    /// List all registered feeds and who added them
    Feeds,
    /// Follow a feed someone already added
    Follow { url: String },
    /// List the feeds the current user follows
    Following,
    /// Show the newest posts from followed feeds
    Browse {
        #[arg(default_value_t = DEFAULT_BROWSE_LIMIT)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", config_dir.display());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = config_dir.join("config.toml");
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let db_path = config.database_path(&config_dir);
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: the database is locked by another process. Please try again.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    match args.command {
        Command::Agg { time_between_reqs } => {
            let fetcher = Fetcher::from_config(&config).context("Failed to create HTTP client")?;
            let mut scheduler = Scheduler::new(db, fetcher, time_between_reqs)?;
            tokio::select! {
                _ = scheduler.run() => {}
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    println!(
                        "Stopped after {} cycles (interval {})",
                        scheduler.cycles(),
                        format_period(scheduler.period())
                    );
                }
            }
        }
        Command::Register { name } => {
            let user = db
                .create_user(&name)
                .await
                .with_context(|| format!("Failed to register user '{}' (name taken?)", name))?;
            config
                .set_current_user(&user.name, &config_path)
                .context("Failed to save config")?;
            println!("User created: {} (id {})", user.name, user.id);
        }
        Command::Login { name } => {
            let user = db.get_user_by_name(&name).await?;
            config
                .set_current_user(&user.name, &config_path)
                .context("Failed to save config")?;
            println!("Logged in as {}", user.name);
        }
        Command::Users => {
            let users = db.get_users().await?;
            if users.is_empty() {
                println!("No users registered. Run `gator register <name>` to create one.");
            }
            for user in users {
                if config.current_user.as_deref() == Some(user.name.as_str()) {
                    println!("* {} (current)", user.name);
                } else {
                    println!("* {}", user.name);
                }
            }
        }
        Command::Reset => {
            let deleted = db
                .delete_all_users()
                .await
                .context("Failed to reset database")?;
            println!("Deleted {} users and everything they owned", deleted);
        }
        Command::Addfeed { name, url } => {
            let user = current_user(&db, &config).await?;
            let feed = add_feed(&db, &user, &name, &url).await?;
            println!("Added feed {} ({}), followed by {}", feed.name, feed.url, user.name);
        }
        Command::Feeds => {
            let feeds = db.get_feeds().await?;
            if feeds.is_empty() {
                println!("No feeds yet. Add one with `gator addfeed <name> <url>`.");
            }
            let owners: HashMap<i64, String> = db
                .get_users()
                .await?
                .into_iter()
                .map(|u| (u.id, u.name))
                .collect();
            for feed in feeds {
                let owner = owners.get(&feed.user_id).map_or("unknown", String::as_str);
                println!("* {} ({}) added by {}", feed.name, feed.url, owner);
            }
        }
        Command::Follow { url } => {
            let user = current_user(&db, &config).await?;
            let (feed, created) = follow_by_url(&db, &user, &url).await?;
            if created {
                println!("{} now follows {}", user.name, feed.name);
            } else {
                println!("{} already follows {}", user.name, feed.name);
            }
        }
        Command::Following => {
            let user = current_user(&db, &config).await?;
            let follows = db.get_follows_for_user(user.id).await?;
            if follows.is_empty() {
                println!("{} does not follow any feeds yet.", user.name);
            }
            for follow in follows {
                println!(
                    "* {} (since {})",
                    follow.feed_name,
                    follow.created_at.format("%Y-%m-%d")
                );
            }
        }
        Command::Browse { limit } => {
            let user = current_user(&db, &config).await?;
            let posts = db.get_posts_for_user(user.id, limit).await?;
            if posts.is_empty() {
                println!("No posts yet. Follow a feed and run `gator agg` to collect some.");
            }
            for item in posts {
                let post = &item.post;
                let published = post
                    .published_at
                    .map(|t| t.format("%a %b %d %Y").to_string())
                    .unwrap_or_else(|| "unknown date".to_string());
                println!("{} from {}", published, item.feed_name);
                println!("--- {} ---", clean_line(&post.title));
                if let Some(description) = &post.description {
                    let line = clean_line(description);
                    println!("    {}", truncate_to_width(&line, DESCRIPTION_WIDTH));
                }
                println!("Link: {}", post.url);
                println!("=====================================");
            }
        }
    }

    Ok(())
}

async fn current_user(db: &Database, config: &Config) -> Result<User> {
    let name = config
        .current_user
        .as_deref()
        .context("No user logged in: run `gator register <name>` or `gator login <name>` first")?;
    db.get_user_by_name(name)
        .await
        .with_context(|| format!("Logged-in user '{}' no longer exists", name))
}
