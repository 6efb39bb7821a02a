use std::time::Duration;

use thiserror::Error;

use crate::net::backend::BackendError;

pub type Result<T> = std::result::Result<T, WaybackError>;

/// Errors produced while talking to the Wayback Machine.
///
/// Transient transport faults and retryable HTTP statuses are consumed by the
/// session's retry loop; every variant here is terminal for the operation
/// that raised it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WaybackError {
    /// The Wayback Machine returned data in a shape we could not parse.
    #[error("could not parse data returned by the Wayback Machine: {0}")]
    UnexpectedResponseFormat(String),

    /// The queried URL is excluded from the archive by the site's robots.txt.
    #[error("{url} is blocked by the site's robots.txt")]
    BlockedByRobots { url: String },

    /// The queried URL has been excluded from the archive by request.
    #[error("{url} has been excluded from the Wayback Machine")]
    BlockedSite { url: String },

    /// The Wayback Machine has no captures of the requested URL.
    #[error("the Wayback Machine has no captures of {url}")]
    NoMemento { url: String },

    /// The archive refused to play back a specific memento.
    #[error("memento at {url} could not be played back: {reason}")]
    MementoPlayback { url: String, reason: String },

    /// The archive itself rate-limited us (HTTP 429 or a rate-limit body).
    ///
    /// `retry_after` is the server-provided cooldown in seconds, when given.
    /// An archived capture *of* a 429 response is historical data and is
    /// never mapped to this variant.
    #[error("rate limited by the Wayback Machine (retry after {retry_after:?} seconds)")]
    RateLimit { retry_after: Option<u64> },

    /// Retries were exhausted on a transient fault.
    ///
    /// `elapsed` is measured from the first attempt and includes time spent
    /// waiting on server responses, not only backoff sleeps.
    #[error("retried {retries} times over {elapsed:?} (cause: {cause})")]
    RetriesExhausted {
        retries: u32,
        elapsed: Duration,
        #[source]
        cause: Box<WaybackError>,
    },

    /// The session was used after `close()`.
    #[error("this session has been closed and cannot send new requests")]
    SessionClosed,

    /// The input does not match the Wayback playback URL schema.
    #[error("\"{0}\" is not a Wayback Machine archive URL")]
    NotAWaybackUrl(String),

    /// The caller supplied arguments the CDX API cannot express.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The caller's cancellation token was triggered.
    #[error("the operation was cancelled")]
    Cancelled,

    /// A memento body was closed before being read.
    #[error("the memento body was closed before it was read")]
    BodyClosed,

    /// A transport-level fault that was not retryable or not retried.
    #[error(transparent)]
    Network(#[from] BackendError),
}
