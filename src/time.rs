//! Timestamp parsing for command-line input
//!
//! Accepts unix milliseconds, `now`, relative offsets such as `now-7d`,
//! RFC 3339, `YYYY-MM-DDTHH:MM:SS` (UTC) and plain dates (UTC midnight).

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const HOUR_MS: i64 = 3600 * 1000;

/// Time string parsing errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("Cannot parse timestamp: {0}")]
    Invalid(String),

    #[error("Time offset out of range: {0}")]
    OutOfRange(String),
}

/// Current time in unix milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse a timestamp string into unix milliseconds
pub fn parse_time(s: &str) -> Result<i64, TimeParseError> {
    let s = s.trim();

    if let Ok(ms) = s.parse::<i64>() {
        return Ok(ms);
    }

    if s.starts_with("now") {
        return parse_relative(s, now_millis());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.and_utc().timestamp_millis());
    }

    if let Some(midnight) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc().timestamp_millis());
    }

    Err(TimeParseError::Invalid(s.to_string()))
}

/// Parse `now` or `now-<N><h|d|w|m>` relative to `now`
///
/// A month counts as 30 days.
fn parse_relative(s: &str, now: i64) -> Result<i64, TimeParseError> {
    if s == "now" {
        return Ok(now);
    }

    let re = regex::Regex::new(r"^now-(\d+)([hdwm])$")
        .map_err(|e| TimeParseError::Invalid(e.to_string()))?;
    let caps = re
        .captures(s)
        .ok_or_else(|| TimeParseError::Invalid(s.to_string()))?;

    let amount: i64 = caps[1]
        .parse()
        .map_err(|_| TimeParseError::OutOfRange(s.to_string()))?;
    let unit_ms = match &caps[2] {
        "h" => HOUR_MS,
        "d" => 24 * HOUR_MS,
        "w" => 7 * 24 * HOUR_MS,
        _ => 30 * 24 * HOUR_MS,
    };

    amount
        .checked_mul(unit_ms)
        .and_then(|offset| now.checked_sub(offset))
        .ok_or_else(|| TimeParseError::OutOfRange(s.to_string()))
}

/// Render unix milliseconds as RFC 3339 (UTC), falling back to the raw number
pub fn format_time(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| ms.to_string())
}
