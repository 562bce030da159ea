// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time parsing and formatting.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a user-supplied ISO 8601 date or datetime.
///
/// Accepts RFC3339 (`2025-03-01T10:00:00Z`), naive datetimes treated as UTC
/// (`2025-03-01T10:00:00`, `2025-03-01 10:00`) and bare dates, which map to
/// midnight UTC.
pub fn parse_iso_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    parse_date(raw).map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// Parse a bare `YYYY-MM-DD` date with no time part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Inclusive upper bound for an end-of-range filter: a bare date covers
/// the whole day, a datetime is used as given.
pub fn parse_range_end(raw: &str) -> Option<DateTime<Utc>> {
    match parse_date(raw) {
        Some(date) => date
            .succ_opt()
            .map(|next| next.and_time(NaiveTime::MIN).and_utc() - chrono::Duration::microseconds(1)),
        None => parse_iso_datetime(raw),
    }
}

/// Compact timestamp used in stored file names, e.g. `20250301_101500`.
pub fn filename_timestamp(date: DateTime<Utc>) -> String {
    date.format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_iso_datetime_variants() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 10, 15, 0).unwrap();
        assert_eq!(parse_iso_datetime("2025-03-01T10:15:00Z"), Some(expected));
        assert_eq!(parse_iso_datetime("2025-03-01T12:15:00+02:00"), Some(expected));
        assert_eq!(parse_iso_datetime("2025-03-01T10:15:00"), Some(expected));
        assert_eq!(parse_iso_datetime("2025-03-01 10:15"), Some(expected));
        assert_eq!(
            parse_iso_datetime("2025-03-01"),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_iso_datetime("yesterday"), None);
        assert_eq!(parse_iso_datetime("2025-13-01"), None);
    }

    #[test]
    fn test_parse_range_end_covers_whole_day() {
        let end = parse_range_end("2025-01-31").unwrap();
        assert!(end > Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap());
        assert!(end < Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());

        let exact = parse_range_end("2025-01-31T08:00:00Z").unwrap();
        assert_eq!(exact, Utc.with_ymd_and_hms(2025, 1, 31, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_filename_timestamp() {
        let date = Utc.with_ymd_and_hms(2025, 3, 1, 9, 5, 7).unwrap();
        assert_eq!(filename_timestamp(date), "20250301_090507");
    }
}
