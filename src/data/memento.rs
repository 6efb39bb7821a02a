use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::data::{Headers, Mode};
use crate::error::{Result, WaybackError};
use crate::net::backend::BodyStream;

/// One entry of a memento's `Link` header: a related resource such as the
/// original URL, the timemap, or an adjacent memento.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    /// Relation type, kept whole (e.g. `original`, `first memento`).
    pub rel: String,
    /// Capture time of the linked memento, when the header provides one.
    pub datetime: Option<DateTime<Utc>>,
}

/// An archived HTTP response ("memento") played back from the Wayback
/// Machine.
///
/// The metadata fields describe the *historical* response: `status_code`,
/// `headers`, and the body are what the captured origin served, not what
/// the archive's own server sent. Archive-side metadata is folded into
/// `timestamp`, `mode`, `memento_url`, and `links`.
///
/// A memento may hold an open connection until its body is read. Reading
/// [`content`](Memento::content) or [`text`](Memento::text) consumes and
/// caches the body; [`close`](Memento::close) releases the connection
/// without reading, as does dropping the value.
pub struct Memento {
    /// The URL this memento is a capture of (not the archive URL).
    pub url: String,
    /// When the capture was taken. Always UTC.
    pub timestamp: DateTime<Utc>,
    /// Playback mode the memento was served in.
    pub mode: Mode,
    /// The archive URL that served this memento.
    pub memento_url: String,
    /// HTTP status of the archived response.
    pub status_code: u16,
    /// The archived response's headers (case-insensitive lookup, original
    /// casing preserved on iteration).
    pub headers: Headers,
    /// Text encoding derived from the archived `Content-Type`, or `None`
    /// when neither the archived nor the response-level header carries a
    /// charset.
    pub encoding: Option<String>,
    /// Related resources from the `Link` header, keyed by relation type.
    pub links: BTreeMap<String, Link>,
    /// Mementos of historically-captured redirects followed to reach this
    /// one, in traversal order.
    pub history: Vec<Memento>,
    /// Every archive URL traversed, including archive-internal redirects
    /// that are not part of captured history.
    pub debug_history: Vec<String>,
    pub(crate) body: Body,
}

pub(crate) enum Body {
    Open(BodyStream),
    Complete(Bytes),
    Closed,
}

impl Memento {
    /// Whether the archived response had a non-error status (< 400).
    pub fn ok(&self) -> bool {
        self.status_code < 400
    }

    /// Whether the archived response was a redirect (3xx).
    pub fn is_redirect(&self) -> bool {
        self.ok() && self.status_code >= 300
    }

    /// The archived response body. Reads the rest of the stream on first
    /// call and caches it; cheap afterwards.
    pub async fn content(&mut self) -> Result<&Bytes> {
        if let Body::Open(stream) = &mut self.body {
            use futures_util::StreamExt;
            let mut buffer = bytes::BytesMut::new();
            while let Some(chunk) = stream.next().await {
                buffer.extend_from_slice(&chunk?);
            }
            self.body = Body::Complete(buffer.freeze());
        }
        match &self.body {
            Body::Complete(bytes) => Ok(bytes),
            Body::Closed => Err(WaybackError::BodyClosed),
            Body::Open(_) => unreachable!("body was just completed"),
        }
    }

    /// The archived response body decoded as text.
    ///
    /// Uses the charset in [`encoding`](Memento::encoding) when present;
    /// otherwise decodes as UTF-8 with replacement characters.
    pub async fn text(&mut self) -> Result<String> {
        let encoding = self
            .encoding
            .as_deref()
            .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()));
        let content = self.content().await?;
        match encoding {
            Some(encoding) => {
                let (text, _, _) = encoding.decode(content);
                Ok(text.into_owned())
            }
            None => Ok(String::from_utf8_lossy(content).into_owned()),
        }
    }

    /// Release the connection without reading the body. Safe to call at any
    /// time; a body that was already read stays available.
    pub fn close(&mut self) {
        if matches!(self.body, Body::Open(_)) {
            self.body = Body::Closed;
        }
    }
}

impl fmt::Debug for Memento {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memento")
            .field("url", &self.url)
            .field("timestamp", &self.timestamp)
            .field("mode", &self.mode)
            .field("memento_url", &self.memento_url)
            .field("status_code", &self.status_code)
            .field("encoding", &self.encoding)
            .field("history", &self.history.len())
            .field("debug_history", &self.debug_history)
            .finish_non_exhaustive()
    }
}

/// Pull the `charset` parameter out of a `Content-Type` header value.
pub(crate) fn charset_from_content_type(value: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|param| {
        let (name, charset) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(charset.trim().trim_matches('"').to_ascii_lowercase())
        } else {
            None
        }
    })
}
