//! Helpers for the command-line surface: feed URL checks and
//! Unicode-aware text fitting for terminal output.

mod text;
mod url_validator;

pub use text::{clean_line, truncate_to_width};
pub use url_validator::{validate_feed_url, UrlValidationError};
