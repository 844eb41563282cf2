//! Server timestamp codec.
//!
//! The REST API renders datetimes as `2024-03-01T10:15:30.000+0000`;
//! filters accept ISO 8601 UTC literals. Internally timestamps are epoch
//! milliseconds.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Parses a server timestamp into epoch milliseconds.
///
/// Accepts both the `+0000` offset form and RFC 3339.
pub fn parse_millis(text: &str) -> Option<i64> {
    DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Formats epoch milliseconds as an ISO 8601 UTC literal with millisecond precision.
///
/// Out-of-range values clamp to the epoch.
pub fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Formats epoch milliseconds the way the server renders record timestamps.
pub fn format_server_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
        .format("%Y-%m-%dT%H:%M:%S%.3f+0000")
        .to_string()
}
