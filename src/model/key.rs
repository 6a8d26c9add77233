//! Key codec
//!
//! Maps entity identities and timestamps onto flat keys whose byte order is
//! the logical order:
//!
//! ```text
//! categories.<name>
//! categories.<name>.values.<seconds>
//! notes.<category>.<seconds>
//! ```
//!
//! Seconds are zero-padded to [`SECONDS_WIDTH`] digits so string order equals
//! chronological order. Identities are not escaped: a category name containing
//! `.` produces keys that collide with the nested keyspaces.

use crate::model::error::{ModelError, ModelResult};
use crate::storage::ScanRange;

/// Separator between key segments
pub const SEPARATOR: char = '.';

/// Prefix of the category keyspace
pub const CATEGORY_PREFIX: &str = "categories.";

/// Prefix of the note keyspace
pub const NOTE_PREFIX: &str = "notes.";

/// Segment between a category key and its value timestamps
pub const VALUES_SEGMENT: &str = ".values.";

/// Lowest suffix used for open-ended scans
pub const SCAN_MIN: &str = "\u{0000}";

/// Highest suffix used for open-ended scans
pub const SCAN_MAX: &str = "\u{FFFF}";

/// Digits in an encoded timestamp
pub const SECONDS_WIDTH: usize = 10;

/// Largest encodable second (year 2286)
pub const MAX_SECONDS: i64 = 9_999_999_999;

/// Render a millisecond timestamp as fixed-width seconds
///
/// Sub-second precision is dropped (floor). Times before the epoch or past
/// [`MAX_SECONDS`] cannot be ordered by a fixed-width decimal and are rejected.
pub fn seconds_as_string(time: i64) -> ModelResult<String> {
    let seconds = time.div_euclid(1000);
    if !(0..=MAX_SECONDS).contains(&seconds) {
        return Err(ModelError::InvalidTimestamp(time));
    }
    Ok(format!("{:0width$}", seconds, width = SECONDS_WIDTH))
}

/// Parse a fixed-width seconds string back to milliseconds
pub fn parse_seconds(encoded: &str) -> Option<i64> {
    if encoded.len() != SECONDS_WIDTH || !encoded.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    encoded.parse::<i64>().ok().map(|seconds| seconds * 1000)
}

/// Key of a category
pub fn category_key(name: &str) -> String {
    format!("{}{}", CATEGORY_PREFIX, name)
}

/// Prefix shared by every value of a category
pub fn values_prefix(category_key: &str) -> String {
    format!("{}{}", category_key, VALUES_SEGMENT)
}

/// Key of one value of a category
pub fn value_key(category_key: &str, time: i64) -> ModelResult<String> {
    Ok(format!(
        "{}{}",
        values_prefix(category_key),
        seconds_as_string(time)?
    ))
}

/// Prefix shared by every note of a category
pub fn note_prefix(category: &str) -> String {
    format!("{}{}{}", NOTE_PREFIX, category, SEPARATOR)
}

/// Key of a note
pub fn note_key(category: &str, time: i64) -> ModelResult<String> {
    Ok(format!("{}{}", note_prefix(category), seconds_as_string(time)?))
}

/// Split a note identity (`<category>.<seconds>`) into its parts
///
/// Splits at the last separator, so the category part may itself contain
/// separators.
pub fn split_note_identity(identity: &str) -> Option<(&str, i64)> {
    let (category, seconds) = identity.rsplit_once(SEPARATOR)?;
    Some((category, parse_seconds(seconds)?))
}

/// Inclusive scan range over the suffixes of `prefix`
///
/// Missing bounds default to [`SCAN_MIN`] and [`SCAN_MAX`], which together
/// cover every key under the prefix.
pub fn prefix_range(prefix: &str, gte: Option<&str>, lte: Option<&str>) -> ScanRange {
    ScanRange::new(
        format!("{}{}", prefix, gte.unwrap_or(SCAN_MIN)),
        format!("{}{}", prefix, lte.unwrap_or(SCAN_MAX)),
    )
}

/// Inclusive scan range over timestamped keys under `prefix`
pub fn time_range(prefix: &str, gte: Option<i64>, lte: Option<i64>) -> ModelResult<ScanRange> {
    let gte = gte.map(seconds_as_string).transpose()?;
    let lte = lte.map(seconds_as_string).transpose()?;
    Ok(prefix_range(prefix, gte.as_deref(), lte.as_deref()))
}
