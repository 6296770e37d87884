//! Timestamp text formats.
//!
//! Storage keeps fixed-width microsecond RFC3339 so text order matches time
//! order; the community wire format uses milliseconds.

use chrono::{DateTime, SecondsFormat, Utc};

/// Parses an RFC3339 timestamp string into UTC.
///
/// ```
/// use storyforge_domain::common::parse_datetime;
/// use chrono::Datelike;
///
/// let dt = parse_datetime("2024-01-15T10:30:00Z").unwrap();
/// assert_eq!(dt.year(), 2024);
/// ```
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// `2024-01-15T10:30:00.000000Z`
pub fn format_storage_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// `2024-01-15T10:30:00.000Z`
pub fn format_wire_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
