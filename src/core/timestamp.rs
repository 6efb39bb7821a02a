//! The 14-digit `YYYYMMDDhhmmss` timestamp format used throughout the
//! Wayback Machine's URLs and the CDX index.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Result, WaybackError};

/// strftime-style layout of a Wayback timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Format a UTC instant as a 14-digit Wayback timestamp.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a Wayback timestamp string into a UTC instant.
///
/// Timestamps in archive URLs may be truncated after any component; missing
/// trailing components are taken as their minimum valid values. A `00` month
/// or day (these occur in real CDX data) is clamped to `01` instead of
/// failing.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if value.len() < 4 || value.len() > 14 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WaybackError::UnexpectedResponseFormat(format!(
            "\"{value}\" is not a Wayback timestamp"
        )));
    }

    let component = |range: std::ops::Range<usize>, default: u32| -> u32 {
        value
            .get(range)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    };

    let year = component(0..4, 0) as i32;
    let mut month = component(4..6.min(value.len()), 1);
    let mut day = component(6..8.min(value.len()), 1);
    let hour = component(8..10.min(value.len()), 0);
    let minute = component(10..12.min(value.len()), 0);
    let second = component(12..14.min(value.len()), 0);

    if month == 0 {
        log::warn!("timestamp {value} has month 00, clamping to January");
        month = 1;
    }
    if day == 0 {
        log::warn!("timestamp {value} has day 00, clamping to the 1st");
        day = 1;
    }

    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .ok_or_else(|| {
            WaybackError::UnexpectedResponseFormat(format!(
                "\"{value}\" is not a valid Wayback timestamp"
            ))
        })
}
