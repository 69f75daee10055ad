//! Wall-clock helpers for run-of-day scheduling.
//!
//! Times travel as `HH:MM` 24-hour strings and are computed as
//! minutes-of-day. Arithmetic always wraps modulo one day so overnight
//! schedules (crew call in the evening, wrap after midnight) need no
//! day-crossing representation.

/// Minutes in one day.
pub const MINUTES_PER_DAY: i64 = 1440;

/// Wrap a signed minute value into `0..1440`.
pub fn wrap_minutes(minutes: i64) -> u32 {
    minutes.rem_euclid(MINUTES_PER_DAY) as u32
}

/// Parse an `HH:MM` string into minutes-of-day.
///
/// Accepts one or two hour digits and exactly two minute digits.
/// Returns `None` for anything else, including out-of-range values.
///
/// # Examples
/// ```
/// use slate_models::clock::parse_clock;
/// assert_eq!(parse_clock("06:30"), Some(390));
/// assert_eq!(parse_clock("7:05"), Some(425));
/// assert_eq!(parse_clock("24:00"), None);
/// ```
pub fn parse_clock(value: &str) -> Option<u32> {
    let (hours, minutes) = value.trim().split_once(':')?;

    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    if !hours.bytes().all(|b| b.is_ascii_digit()) || !minutes.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    Some(hours * 60 + minutes)
}

/// Format minutes-of-day as `HH:MM`. Values outside one day are wrapped.
pub fn format_clock(minutes: u32) -> String {
    let minutes = wrap_minutes(minutes as i64);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Add a signed offset to a minute-of-day anchor, wrapping at midnight.
pub fn offset_clock(anchor: u32, offset_minutes: i64) -> u32 {
    wrap_minutes(anchor as i64 + offset_minutes)
}

/// Forward distance from `from` to `to`, going past midnight if needed.
pub fn minutes_between(from: u32, to: u32) -> u32 {
    wrap_minutes(to as i64 - from as i64)
}

/// Normalize a loosely formatted clock string to canonical `HH:MM`.
pub fn normalize_clock(value: &str) -> Option<String> {
    parse_clock(value).map(format_clock)
}
