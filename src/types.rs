//! Common types used throughout pullkit
//!
//! This module contains shared type definitions, type aliases,
//! and the timestamp handling used by cursors and local filters.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use std::collections::HashMap;

use crate::error::{Error, Result};

// ============================================================================
// Type Aliases
// ============================================================================

/// A single record as returned by the remote API (schemaless JSON)
pub type Record = serde_json::Value;

/// One page worth of records
pub type Batch = Vec<Record>;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// Timestamps
// ============================================================================

/// Parse a cursor timestamp.
///
/// Accepts RFC 3339 with an offset, a naive `YYYY-MM-DDTHH:MM:SS[.frac]`
/// (read as UTC), or a bare `YYYY-MM-DD` (midnight UTC). Remote APIs are
/// inconsistent about offsets on their modification timestamps, so the
/// parser is tolerant; anything else is an invalid cursor.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }
    Err(Error::invalid_cursor(
        value,
        "expected an ISO-8601 timestamp",
    ))
}

/// Format an instant as RFC 3339 with seconds precision (`Z` suffix).
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ============================================================================
// Record Utilities
// ============================================================================

/// Get a string field from a record.
pub fn string_field<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record.get(field).and_then(|v| v.as_str())
}

/// Get an integer field from a record.
pub fn integer_field(record: &Record, field: &str) -> Option<i64> {
    record.get(field).and_then(serde_json::Value::as_i64)
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("2021-03-01T12:30:45+00:00", "2021-03-01T12:30:45Z"; "rfc3339 utc")]
    #[test_case("2021-03-01T12:30:45Z", "2021-03-01T12:30:45Z"; "rfc3339 zulu")]
    #[test_case("2021-03-01T14:30:45+02:00", "2021-03-01T12:30:45Z"; "rfc3339 offset")]
    #[test_case("2021-03-01T12:30:45", "2021-03-01T12:30:45Z"; "naive datetime")]
    #[test_case("2021-03-01T12:30:45.123", "2021-03-01T12:30:45Z"; "naive with fraction")]
    #[test_case("2021-03-01", "2021-03-01T00:00:00Z"; "bare date")]
    #[test_case("  2021-03-01  ", "2021-03-01T00:00:00Z"; "surrounding whitespace")]
    fn test_parse_timestamp(input: &str, expected: &str) {
        let parsed = parse_timestamp(input).unwrap();
        assert_eq!(format_timestamp(parsed), expected);
    }

    #[test_case(""; "empty")]
    #[test_case("not a date"; "garbage")]
    #[test_case("03/01/2021"; "slash format")]
    #[test_case("1614601845"; "unix seconds")]
    fn test_parse_timestamp_rejects(input: &str) {
        let err = parse_timestamp(input).unwrap_err();
        assert!(matches!(err, Error::InvalidCursor { .. }));
    }

    #[test]
    fn test_parse_timestamp_ordering() {
        let older = parse_timestamp("2021-03-01T00:00:00").unwrap();
        let newer = parse_timestamp("2021-03-01T00:00:01Z").unwrap();
        assert!(older < newer);
    }

    #[test]
    fn test_string_field() {
        let record = json!({"UpdatedDateUTC": "2021-03-01T12:30:45", "Total": 10});
        assert_eq!(
            string_field(&record, "UpdatedDateUTC"),
            Some("2021-03-01T12:30:45")
        );
        assert_eq!(string_field(&record, "Total"), None);
        assert_eq!(string_field(&record, "Missing"), None);
    }

    #[test]
    fn test_integer_field() {
        let record = json!({"JournalNumber": 57, "Reference": "J-57"});
        assert_eq!(integer_field(&record, "JournalNumber"), Some(57));
        assert_eq!(integer_field(&record, "Reference"), None);
        assert_eq!(integer_field(&record, "Missing"), None);
    }

    #[test]
    fn test_option_string_none_if_empty() {
        assert_eq!(
            Some("test".to_string()).none_if_empty(),
            Some("test".to_string())
        );
        assert_eq!(Some(String::new()).none_if_empty(), None);
        assert_eq!(None::<String>.none_if_empty(), None);
        assert_eq!("test".to_string().none_if_empty(), Some("test".to_string()));
        assert_eq!(String::new().none_if_empty(), None);
    }
}
