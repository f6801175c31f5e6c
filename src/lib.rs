//! gator: a feed aggregator that periodically ingests RSS entries into SQLite.
//!
//! - [`storage`] - users, feeds, follows and posts in SQLite
//! - [`feed`] - fetching, decoding and date normalization
//! - [`aggregator`] - the refresh loop and entry persistence
//! - [`commands`] - feed registration and follows behind the CLI
//! - [`config`] - the TOML config file, including the logged-in user

pub mod aggregator;
pub mod commands;
pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
