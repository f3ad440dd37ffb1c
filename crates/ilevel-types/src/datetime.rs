//! Lenient, timezone-naive date parsing.
//!
//! Every accepted spelling is reduced to a [`NaiveDateTime`] holding the
//! wall-clock time as written. Offsets (`Z`, `+02:00`) are dropped, not
//! applied, so two values written in different zones compare by their
//! local reading.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Canonical rendering of a watermark (`2023-01-03T00:00:00Z`).
pub const WATERMARK_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Canonical rendering of a normalized date value (`2023-01-03T00:00:00`).
pub const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse any supported date or datetime spelling, discarding offsets.
#[must_use]
pub fn parse_naive_datetime(input: &str) -> Option<NaiveDateTime> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.naive_local());
    }

    let without_zulu = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(without_zulu, fmt) {
            return Some(ndt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(without_zulu, fmt) {
            return Some(date.and_time(chrono::NaiveTime::MIN));
        }
    }
    None
}

/// Render a timestamp as a watermark string.
#[must_use]
pub fn format_watermark(value: NaiveDateTime) -> String {
    value.format(WATERMARK_FORMAT).to_string()
}

/// Render a timestamp as a normalized record value.
#[must_use]
pub fn format_naive(value: NaiveDateTime) -> String {
    value.format(NAIVE_FORMAT).to_string()
}
