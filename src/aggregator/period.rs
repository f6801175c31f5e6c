//! Parsing for the `agg` interval argument.
//!
//! Accepts the duration notation operators already use for this tool:
//! a sequence of decimal numbers each followed by a unit, e.g. `30s`, `5m`,
//! `1h30m`, `1.5h`, `250ms`.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("empty duration (examples: 30s, 1m, 1h30m)")]
    Empty,
    #[error("invalid duration {0:?} (examples: 30s, 1m, 1h30m)")]
    Invalid(String),
    #[error("missing unit in duration {0:?} (valid units: ns, us, ms, s, m, h)")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?} (valid units: ns, us, ms, s, m, h)")]
    UnknownUnit { unit: String, input: String },
    #[error("duration {0:?} must be greater than zero")]
    NotPositive(String),
    #[error("duration {0:?} is too large")]
    Overflow(String),
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3_600 * NANOS_PER_SEC),
        _ => None,
    }
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

/// Parse a duration such as `"1m30s"` into a strictly positive [`Duration`].
///
/// ```
/// use std::time::Duration;
/// use gator::aggregator::parse_period;
///
/// assert_eq!(parse_period("1m30s").unwrap(), Duration::from_secs(90));
/// assert!(parse_period("0s").is_err());
/// ```
pub fn parse_period(input: &str) -> Result<Duration, PeriodError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(PeriodError::Empty);
    }
    if s.starts_with('-') {
        return Err(PeriodError::NotPositive(input.to_string()));
    }
    let s = s.strip_prefix('+').unwrap_or(s);
    if s == "0" {
        return Err(PeriodError::NotPositive(input.to_string()));
    }

    let invalid = || PeriodError::Invalid(input.to_string());
    let overflow = || PeriodError::Overflow(input.to_string());

    let mut total: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !is_number_char(c)).unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail.find(is_number_char).unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        rest = tail;

        if number.is_empty() || number == "." {
            return Err(invalid());
        }
        if unit.is_empty() {
            return Err(PeriodError::MissingUnit(input.to_string()));
        }
        let per_unit = unit_nanos(unit).ok_or_else(|| PeriodError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if fraction.contains('.') {
            return Err(invalid());
        }

        if !whole.is_empty() {
            let whole: u128 = whole.parse().map_err(|_| overflow())?;
            total = whole
                .checked_mul(per_unit)
                .and_then(|n| total.checked_add(n))
                .ok_or_else(overflow)?;
        }

        // Digits past nanosecond precision cannot change the result
        let fraction = &fraction[..fraction.len().min(18)];
        if !fraction.is_empty() {
            let digits: u128 = fraction.parse().map_err(|_| invalid())?;
            let scale = 10u128.pow(fraction.len() as u32);
            total = total
                .checked_add(digits * per_unit / scale)
                .ok_or_else(overflow)?;
        }
    }

    if total == 0 {
        return Err(PeriodError::NotPositive(input.to_string()));
    }

    let nanos = u64::try_from(total).map_err(|_| overflow())?;
    Ok(Duration::from_nanos(nanos))
}

/// Render a duration compactly for progress output: `1h30m`, `45s`, `250ms`.
pub fn format_period(period: Duration) -> String {
    let secs = period.as_secs();
    if secs == 0 {
        return format!("{}ms", period.as_millis());
    }

    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let millis = period.subsec_millis();

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    if millis > 0 {
        let frac = format!("{:03}", millis);
        out.push_str(&format!("{}.{}s", seconds, frac.trim_end_matches('0')));
    } else if seconds > 0 {
        out.push_str(&format!("{}s", seconds));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_units() {
        assert_eq!(parse_period("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_period("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_period("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_period("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_period("10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_period("10µs").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_period("7ns").unwrap(), Duration::from_nanos(7));
    }

    #[test]
    fn test_composite_and_decimal() {
        assert_eq!(parse_period("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_period("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_period("1m0.5s").unwrap(), Duration::from_millis(60_500));
        assert_eq!(parse_period(".5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_period("+2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_period(" 1m ").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert_eq!(parse_period(""), Err(PeriodError::Empty));
        assert_eq!(parse_period("   "), Err(PeriodError::Empty));
        assert!(matches!(parse_period("10"), Err(PeriodError::MissingUnit(_))));
        assert!(matches!(parse_period("1m30"), Err(PeriodError::MissingUnit(_))));
        assert!(matches!(
            parse_period("5 minutes"),
            Err(PeriodError::UnknownUnit { .. })
        ));
        assert!(matches!(parse_period("3d"), Err(PeriodError::UnknownUnit { .. })));
        assert!(matches!(parse_period("abc"), Err(PeriodError::Invalid(_))));
        assert!(matches!(parse_period("1.2.3s"), Err(PeriodError::Invalid(_))));
        assert!(matches!(parse_period(".s"), Err(PeriodError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_and_negative() {
        assert!(matches!(parse_period("0"), Err(PeriodError::NotPositive(_))));
        assert!(matches!(parse_period("0s"), Err(PeriodError::NotPositive(_))));
        assert!(matches!(parse_period("0h0m"), Err(PeriodError::NotPositive(_))));
        assert!(matches!(parse_period("-5s"), Err(PeriodError::NotPositive(_))));
    }

    #[test]
    fn test_overflow() {
        assert!(matches!(
            parse_period("99999999999999999999h"),
            Err(PeriodError::Overflow(_))
        ));
    }

    #[test]
    fn test_format_period() {
        assert_eq!(format_period(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_period(Duration::from_secs(3600)), "1h");
        assert_eq!(format_period(Duration::from_secs(5430)), "1h30m30s");
        assert_eq!(format_period(Duration::from_millis(250)), "250ms");
        assert_eq!(format_period(Duration::from_millis(1500)), "1.5s");
    }
}
