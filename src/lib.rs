//! A client for the Internet Archive's [Wayback Machine].
//!
//! The Wayback Machine exposes two services this crate wraps: the CDX index
//! of every known capture of a URL, and "memento" playback of individual
//! captures, including the archived response's body and headers.
//!
//! The interesting work happens on the client side:
//!
//! - [`Client::search`] hides the CDX resume-key pagination protocol behind
//!   a lazy iterator that deduplicates rows and survives transient faults
//!   mid-stream.
//! - [`Client::get_memento`] walks Wayback's redirect graph, telling
//!   *historically captured* redirects (part of the archived record) apart
//!   from the archive's own navigation redirects, and returns a [`Memento`]
//!   carrying both the archived response and the derived metadata.
//! - [`Session`] provides connection pooling, per-endpoint rate limits,
//!   retry with backoff, per-read timeouts, cooperative cancellation, and a
//!   typed error taxonomy for Wayback's ambiguous failure signals.
//!
//! This is a read-only client; nothing here writes to the archive.
//!
//! [Wayback Machine]: https://web.archive.org/

mod client;
mod core;
mod data;
mod error;
mod net;
mod search;

pub use crate::client::Client;
pub use crate::core::archive_url::{format_archive_url, parse_archive_url};
pub use crate::core::patterns::BodyPatterns;
pub use crate::core::timestamp::{format_timestamp, parse_timestamp};
pub use crate::data::{
    CdxRecord, Headers, Link, MatchType, Memento, MementoOptions, MementoRequest, Mode,
    SearchDate, SearchOptions,
};
pub use crate::error::{Result, WaybackError};
pub use crate::net::{
    BackendError, BackendResponse, CancelToken, Endpoint, HttpBackend, MockBackend, MockResponse,
    ReqwestBackend, ResponseBody, Session, SessionConfig,
};
pub use crate::search::Search;
