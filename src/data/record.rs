use chrono::{DateTime, Utc};

/// One row of the Wayback Machine's capture index.
///
/// Returned by [`Client::search`](crate::Client::search). The first seven
/// fields come straight from the CDX API; `raw_url` and `view_url` are
/// synthesized playback URLs for the capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdxRecord {
    /// SURT-formatted canonical lookup key, e.g. `gov,nasa)/`.
    pub key: String,
    /// Capture time. Always UTC.
    pub timestamp: DateTime<Utc>,
    /// The URL that was captured. May differ from the query URL by case,
    /// scheme, or trailing slash.
    pub url: String,
    /// MIME type of the capture, e.g. `text/html`, `unk`, or the sentinel
    /// `warc/revisit` for a capture stored by reference to an earlier one.
    pub mime_type: String,
    /// HTTP status the origin returned when captured. `None` for revisit
    /// records and other rows where CDX reports `-`.
    pub status_code: Option<u16>,
    /// Content digest as returned by CDX (base-32 SHA-1), or `-` when absent.
    pub digest: String,
    /// Captured byte length. Often absent and inaccurate for revisit records.
    pub length: Option<u64>,
    /// Playback URL serving the exact archived bytes (`id_` mode).
    pub raw_url: String,
    /// Playback URL for the browser-friendly rewritten view.
    pub view_url: String,
}

impl CdxRecord {
    /// Identity used to drop the exact duplicates the CDX API occasionally
    /// returns across page boundaries.
    pub(crate) fn fingerprint(&self) -> (DateTime<Utc>, &str, &str) {
        (self.timestamp, self.url.as_str(), self.digest.as_str())
    }
}
