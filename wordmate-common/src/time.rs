//! Timestamp and date utilities

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC calendar date
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parse a strict `YYYY-MM-DD` calendar date
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Best-effort date parsing
///
/// Accepts a plain ISO date, an RFC 3339 timestamp (trailing `Z` allowed) or a
/// naive ISO datetime. Anything else yields `None`.
pub fn parse_date_lenient(value: &str) -> Option<NaiveDate> {
    parse_date(value).or_else(|| parse_datetime_lenient(value).map(|dt| dt.date_naive()))
}

/// Best-effort timestamp parsing
///
/// Naive datetimes are taken as UTC; a bare date becomes midnight UTC.
pub fn parse_datetime_lenient(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    parse_date(value)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
