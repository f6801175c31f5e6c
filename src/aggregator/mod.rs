//! The aggregation loop.
//!
//! Each tick the [`Scheduler`] picks the stalest feed, stamps it, fetches and
//! parses its document, and hands every entry to [`persist_entry`]. Failures
//! are reported per cycle or per entry and never stop the loop.

mod period;
mod persister;
mod scheduler;

pub use period::{format_period, parse_period, PeriodError};
pub use persister::{persist_entry, PersistError};
pub use scheduler::{
    CycleError, CycleSummary, EntryOutcome, EntryReport, Scheduler, SchedulerError,
    SchedulerState,
};
