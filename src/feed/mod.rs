//! Feed retrieval and decoding.
//!
//! - [`fetcher`] - single bounded-timeout HTTP GET returning raw bytes
//! - [`parser`] - RSS 2.0 decoding into a [`ParsedDocument`]
//! - [`date`] - publish-date normalization over an ordered layout list
//!
//! All three are independent of storage; the aggregator wires them together.

mod date;
mod fetcher;
mod parser;

pub use date::{normalize_date, DateError};
pub use fetcher::{FetchError, Fetcher};
pub use parser::{parse_document, ParseError, ParsedDocument, ParsedEntry};
