//! Parsing and formatting of Wayback playback URLs.
//!
//! A playback URL has the shape
//! `https://web.archive.org/web/<timestamp><mode>/<target-url>`, where
//! `<timestamp>` is up to 14 digits and `<mode>` is an optional token such as
//! `id_` (see [`Mode`]).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::core::timestamp::{format_timestamp, parse_timestamp};
use crate::data::Mode;
use crate::error::{Result, WaybackError};

static ARCHIVE_URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://web\.archive\.org/web/(\d+)(\w\w_)?/(.+)$").unwrap());

/// Parse an archive URL into its `(target_url, timestamp, mode)` components.
///
/// Fails with [`WaybackError::NotAWaybackUrl`] when the input does not match
/// the playback URL schema.
pub fn parse_archive_url(archive_url: &str) -> Result<(String, DateTime<Utc>, Mode)> {
    let captures = ARCHIVE_URL_REGEX
        .captures(archive_url)
        .ok_or_else(|| WaybackError::NotAWaybackUrl(archive_url.to_string()))?;

    let timestamp = parse_timestamp(&captures[1])
        .map_err(|_| WaybackError::NotAWaybackUrl(archive_url.to_string()))?;
    let mode = Mode::from_token(captures.get(2).map_or("", |m| m.as_str()));
    let url = clean_embedded_url(&captures[3]);

    Ok((url, timestamp, mode))
}

/// Format an archive URL for a capture of `url` at `timestamp` in `mode`.
///
/// This is the inverse of [`parse_archive_url`]: formatting the parsed
/// components of a canonical archive URL reproduces it exactly.
pub fn format_archive_url(url: &str, timestamp: &DateTime<Utc>, mode: &Mode) -> String {
    format!(
        "https://web.archive.org/web/{}{}/{}",
        format_timestamp(timestamp),
        mode.token(),
        url
    )
}

/// Format an archive URL keeping a CDX-reported timestamp string verbatim.
///
/// CDX rows occasionally carry timestamps with `00` month or day digits;
/// playback URLs built from those rows must embed the string as reported so
/// the archive can resolve the capture.
pub(crate) fn format_archive_url_with_raw_timestamp(
    url: &str,
    timestamp: &str,
    mode: &Mode,
) -> String {
    format!(
        "https://web.archive.org/web/{}{}/{}",
        timestamp,
        mode.token(),
        url
    )
}

/// Fix encoding issues with a target URL extracted from an archive URL.
///
/// Target URLs are *sometimes* percent-encoded inside playback URLs. Decode
/// only when the scheme itself is encoded, so that query strings with
/// legitimate escapes are left alone.
pub(crate) fn clean_embedded_url(url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http%3a") || lower.starts_with("https%3a") {
        percent_decode_str(url)
            .decode_utf8()
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| url.to_string())
    } else {
        url.to_string()
    }
}
