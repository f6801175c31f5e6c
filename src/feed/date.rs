//! Publish-date normalization.
//!
//! Feeds in the wild disagree on how to write a timestamp. [`normalize_date`]
//! tries a fixed list of layouts in order and returns the first one that
//! parses. Order matters: a string can match more than one layout, and the
//! earlier layout wins.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("could not parse date: {0:?}")]
    Unparseable(String),
}

/// How a layout expresses its time zone.
#[derive(Debug, Clone, Copy)]
enum Zone {
    /// `%z`/`%:z` inside the format string
    Numeric,
    /// Trailing alphabetic abbreviation (`GMT`, `EST`, ...) after the format
    Named,
    /// RFC 3339 / ISO 8601 with `Z` or numeric offset
    Rfc3339,
    /// No zone in the input; read as UTC
    Utc,
    /// Bare date; midnight UTC
    DateOnly,
}

struct Layout {
    format: &'static str,
    zone: Zone,
}

const LAYOUTS: &[Layout] = &[
    // RFC 1123 with numeric zone: Mon, 02 Jan 2006 15:04:05 -0700
    Layout { format: "%a, %d %b %Y %H:%M:%S %z", zone: Zone::Numeric },
    // RFC 1123: Mon, 02 Jan 2006 15:04:05 MST
    Layout { format: "%a, %d %b %Y %H:%M:%S", zone: Zone::Named },
    // RFC 822 with numeric zone: 02 Jan 06 15:04 -0700
    Layout { format: "%d %b %y %H:%M %z", zone: Zone::Numeric },
    // RFC 822: 02 Jan 06 15:04 MST
    Layout { format: "%d %b %y %H:%M", zone: Zone::Named },
    // RFC 3339: 2006-01-02T15:04:05Z07:00
    Layout { format: "", zone: Zone::Rfc3339 },
    Layout { format: "%Y-%m-%dT%H:%M:%S%:z", zone: Zone::Numeric },
    Layout { format: "%Y-%m-%d %H:%M:%S %z", zone: Zone::Numeric },
    Layout { format: "%Y-%m-%d %H:%M:%S", zone: Zone::Utc },
    Layout { format: "%Y-%m-%d", zone: Zone::DateOnly },
    Layout { format: "%d %b %Y %H:%M:%S", zone: Zone::Named },
    Layout { format: "%d %b %Y %H:%M:%S %z", zone: Zone::Numeric },
    // Unpadded day of month: Mon, 2 Jan 2006 15:04:05 MST
    Layout { format: "%a, %e %b %Y %H:%M:%S", zone: Zone::Named },
    Layout { format: "%a, %e %b %Y %H:%M:%S %z", zone: Zone::Numeric },
];

/// Parse a feed timestamp into an absolute UTC instant.
///
/// Leading and trailing whitespace is ignored.
///
/// # Errors
///
/// [`DateError::Unparseable`] when no layout matches. Callers decide on a
/// fallback; this function never guesses.
///
/// # Examples
///
/// ```
/// use gator::feed::normalize_date;
///
/// let a = normalize_date("Mon, 02 Jan 2006 15:04:05 -0700").unwrap();
/// let b = normalize_date("2006-01-02T22:04:05Z").unwrap();
/// assert_eq!(a, b);
/// ```
pub fn normalize_date(raw: &str) -> Result<DateTime<Utc>, DateError> {
    let input = raw.trim();

    LAYOUTS
        .iter()
        .find_map(|layout| parse_with(layout, input))
        .ok_or_else(|| DateError::Unparseable(raw.to_string()))
}

/// Layouts that start with a day name. The name is checked for spelling
/// only: feeds often carry a weekday that does not match the date, and the
/// date wins.
const WEEKDAY_PREFIX: &str = "%a, ";
const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

fn strip_weekday(input: &str) -> Option<&str> {
    let (day, rest) = input.split_once(", ")?;
    WEEKDAYS
        .iter()
        .any(|w| w.eq_ignore_ascii_case(day))
        .then_some(rest)
}

fn parse_with(layout: &Layout, input: &str) -> Option<DateTime<Utc>> {
    let (format, input) = match layout.format.strip_prefix(WEEKDAY_PREFIX) {
        Some(format) => (format, strip_weekday(input)?),
        None => (layout.format, input),
    };

    match layout.zone {
        Zone::Numeric => DateTime::parse_from_str(input, format)
            .ok()
            .and_then(|dt| two_digit_year_pivot(dt, format))
            .map(|dt| dt.with_timezone(&Utc)),
        Zone::Named => {
            let (head, offset) = split_named_zone(input)?;
            let naive = NaiveDateTime::parse_from_str(head, format).ok()?;
            two_digit_year_pivot(naive, format)?
                .and_local_timezone(offset)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
        }
        Zone::Rfc3339 => DateTime::parse_from_rfc3339(input)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Zone::Utc => NaiveDateTime::parse_from_str(input, format)
            .ok()
            .map(|naive| naive.and_utc()),
        Zone::DateOnly => NaiveDate::parse_from_str(input, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc()),
    }
}

/// `%y` maps 00-69 to 20xx; RFC 822 feeds expect 69-99 to be 19xx.
/// Applied to the local time, before any offset shifts the year.
fn two_digit_year_pivot<T: Datelike>(value: T, format: &str) -> Option<T> {
    if format.contains("%y") && value.year() == 2069 {
        value.with_year(1969)
    } else {
        Some(value)
    }
}

/// Split `"... GMT"` into the date part and the zone's offset.
fn split_named_zone(input: &str) -> Option<(&str, FixedOffset)> {
    let (head, zone) = input.rsplit_once(' ')?;
    Some((head.trim_end(), named_offset(zone)?))
}

/// Offset for an RFC 822 zone name.
///
/// Any other all-caps abbreviation is read as UTC: abbreviations are
/// ambiguous (`IST`, `CST`, ...), so an unknown one carries no usable offset.
fn named_offset(zone: &str) -> Option<FixedOffset> {
    if zone.is_empty() || zone.len() > 5 || !zone.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }

    let hours = match zone {
        "UT" | "UTC" | "GMT" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        _ => {
            tracing::debug!(zone = zone, "Unknown zone abbreviation, reading as UTC");
            0
        }
    };
    FixedOffset::east_opt(hours * 3600)
}
