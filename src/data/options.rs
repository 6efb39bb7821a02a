use chrono::{DateTime, NaiveDate, Utc};

use crate::core::archive_url::parse_archive_url;
use crate::core::timestamp::format_timestamp;
use crate::data::{CdxRecord, Mode};
use crate::error::Result;
use crate::net::CancelToken;

/// How the CDX index matches the queried URL against its SURT keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// Only the exact URL.
    Exact,
    /// The URL and everything under its path.
    Prefix,
    /// Everything on the URL's host.
    Host,
    /// The host and all of its subdomains.
    Domain,
}

impl MatchType {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Prefix => "prefix",
            MatchType::Host => "host",
            MatchType::Domain => "domain",
        }
    }
}

/// A search boundary: either a whole day or an exact UTC instant.
///
/// Days are widened to their full extent: a `from` day starts at 00:00:00
/// and a `to` day ends at 23:59:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDate {
    Day(NaiveDate),
    Instant(DateTime<Utc>),
}

impl SearchDate {
    pub(crate) fn to_query(self, end_of_day: bool) -> String {
        match self {
            SearchDate::Instant(instant) => format_timestamp(&instant),
            SearchDate::Day(day) => {
                let time = if end_of_day {
                    day.and_hms_opt(23, 59, 59)
                } else {
                    day.and_hms_opt(0, 0, 0)
                };
                // and_hms_opt only fails for out-of-range times; these are
                // constants.
                format_timestamp(&time.expect("valid time of day").and_utc())
            }
        }
    }
}

impl From<NaiveDate> for SearchDate {
    fn from(day: NaiveDate) -> Self {
        SearchDate::Day(day)
    }
}

impl From<DateTime<Utc>> for SearchDate {
    fn from(instant: DateTime<Utc>) -> Self {
        SearchDate::Instant(instant)
    }
}

/// Options for [`Client::search`](crate::Client::search).
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// SURT match scope. When unset, inferred from the URL: `exact`, or
    /// `prefix` when the URL ends in `*`.
    pub match_type: Option<MatchType>,
    /// Only include captures at or after this boundary.
    pub from_date: Option<SearchDate>,
    /// Only include captures at or before this boundary.
    pub to_date: Option<SearchDate>,
    /// Results per page. Positive takes the first N, negative the last N.
    ///
    /// Always sent: without a limit the CDX server does not paginate and
    /// silently truncates large result sets. Default: 1000.
    pub limit: i64,
    /// Ask the server for faster (but approximately-sized) results when
    /// fetching the latest captures. Auto-enabled when `limit` is negative
    /// and no explicit value is set.
    pub fast_latest: Option<bool>,
    /// Resolve `warc/revisit` rows to the capture they reference.
    /// Default: true.
    pub resolve_revisits: bool,
    /// `field:regex` filter expressions, all applied conjunctively.
    pub filters: Vec<String>,
    /// Collapse adjacent rows that match on this field.
    pub collapse: Option<String>,
    /// Drop rows whose captured URL is crawler junk (pasted e-mail
    /// addresses, `data:` URLs, and the like). Default: true.
    pub skip_malformed_results: bool,
    /// Cancellation signal checked between pages and retries.
    pub cancel: CancelToken,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            match_type: None,
            from_date: None,
            to_date: None,
            limit: 1000,
            fast_latest: None,
            resolve_revisits: true,
            filters: Vec::new(),
            collapse: None,
            skip_malformed_results: true,
            cancel: CancelToken::new(),
        }
    }
}

impl SearchOptions {
    #[must_use]
    pub fn match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = Some(match_type);
        self
    }

    #[must_use]
    pub fn from_date(mut self, date: impl Into<SearchDate>) -> Self {
        self.from_date = Some(date.into());
        self
    }

    #[must_use]
    pub fn to_date(mut self, date: impl Into<SearchDate>) -> Self {
        self.to_date = Some(date.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn fast_latest(mut self, fast_latest: bool) -> Self {
        self.fast_latest = Some(fast_latest);
        self
    }

    #[must_use]
    pub fn resolve_revisits(mut self, resolve_revisits: bool) -> Self {
        self.resolve_revisits = resolve_revisits;
        self
    }

    /// Add one `field:regex` filter expression.
    #[must_use]
    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filters.push(expression.into());
        self
    }

    #[must_use]
    pub fn collapse(mut self, field: impl Into<String>) -> Self {
        self.collapse = Some(field.into());
        self
    }

    #[must_use]
    pub fn skip_malformed_results(mut self, skip: bool) -> Self {
        self.skip_malformed_results = skip;
        self
    }

    #[must_use]
    pub fn cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Options for [`Client::get_memento`](crate::Client::get_memento).
#[derive(Debug, Clone)]
pub struct MementoOptions {
    /// Playback mode to request. Default: [`Mode::Original`].
    pub mode: Mode,
    /// Require a capture at exactly the requested time. When false, the
    /// closest capture within `target_window` is accepted. Default: true.
    pub exact: bool,
    /// Apply the exactness requirement to each historical redirect target
    /// as well. Defaults to the value of `exact`.
    pub exact_redirects: Option<bool>,
    /// Maximum seconds between the requested and landed capture time.
    /// Default: 86 400 (24 hours).
    pub target_window: u64,
    /// Follow redirects the origin served at capture time, returning the
    /// memento of the redirect target. Default: true.
    pub follow_redirects: bool,
    /// Maximum historical redirects to follow. Default: 10.
    pub max_redirects: u32,
    /// Cancellation signal checked before each redirect hop and retry.
    pub cancel: CancelToken,
}

impl Default for MementoOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Original,
            exact: true,
            exact_redirects: None,
            target_window: 24 * 60 * 60,
            follow_redirects: true,
            max_redirects: 10,
            cancel: CancelToken::new(),
        }
    }
}

impl MementoOptions {
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    #[must_use]
    pub fn exact_redirects(mut self, exact_redirects: bool) -> Self {
        self.exact_redirects = Some(exact_redirects);
        self
    }

    #[must_use]
    pub fn target_window(mut self, seconds: u64) -> Self {
        self.target_window = seconds;
        self
    }

    #[must_use]
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    #[must_use]
    pub fn cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// What to fetch with [`Client::get_memento`](crate::Client::get_memento):
/// a target URL and capture time, optionally carrying a playback mode parsed
/// from an archive URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MementoRequest {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    /// Mode parsed from an archive URL; `None` defers to
    /// [`MementoOptions::mode`].
    pub mode: Option<Mode>,
}

impl MementoRequest {
    /// Request a capture of `url` taken at `timestamp`.
    pub fn new(url: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            timestamp,
            mode: None,
        }
    }

    /// Derive a request from a full archive URL such as
    /// `https://web.archive.org/web/20180816111911id_/http://www.noaa.gov/`.
    pub fn from_archive_url(archive_url: &str) -> Result<Self> {
        let (url, timestamp, mode) = parse_archive_url(archive_url)?;
        Ok(Self {
            url,
            timestamp,
            mode: Some(mode),
        })
    }
}

impl From<&CdxRecord> for MementoRequest {
    fn from(record: &CdxRecord) -> Self {
        Self::new(record.url.clone(), record.timestamp)
    }
}
