//! The HTTP transport seam.
//!
//! All network I/O goes through the [`HttpBackend`] trait so the session,
//! search, and memento code can be exercised against scripted responses.
//! [`ReqwestBackend`] is the production implementation; [`MockBackend`]
//! serves the test suites.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use thiserror::Error;

use crate::data::Headers;

/// A boxed stream of response body chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BackendError>> + Send + 'static>>;

/// Transport-level failures, classified for the retry policy.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The connection could not be established.
    #[error("connection error: {0}")]
    Connect(String),

    /// A read from the socket timed out.
    #[error("read timed out: {0}")]
    Timeout(String),

    /// Any other transport failure.
    #[error("request error: {0}")]
    Request(String),
}

impl BackendError {
    /// Connection errors and read timeouts are worth retrying; other
    /// request failures are not.
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Connect(_) | BackendError::Timeout(_))
    }
}

/// A response as seen by the session layer: status, headers, and a body that
/// may still be streaming from the network.
pub struct BackendResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: ResponseBody,
}

impl std::fmt::Debug for BackendResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .finish()
    }
}

/// A response body, either fully in memory or still attached to the socket.
pub enum ResponseBody {
    Full(Bytes),
    Stream(BodyStream),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Full(bytes) => f.debug_tuple("Full").field(bytes).finish(),
            ResponseBody::Stream(_) => f.debug_tuple("Stream").finish(),
        }
    }
}

impl BackendResponse {
    pub fn new(status: u16, headers: Headers, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Read the whole body into memory, releasing the connection.
    pub async fn into_bytes(self) -> Result<Bytes, BackendError> {
        self.body.into_bytes().await
    }

    /// Read the whole body and decode it as text, replacing invalid UTF-8.
    pub async fn into_text_lossy(self) -> Result<String, BackendError> {
        let bytes = self.into_bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the body to its end and discard it, so the underlying pooled
    /// connection can be reused. Read errors are ignored; the connection is
    /// released either way.
    pub async fn drain(self) {
        match self.body {
            ResponseBody::Full(_) => {}
            ResponseBody::Stream(mut stream) => while stream.next().await.is_some() {},
        }
    }
}

impl ResponseBody {
    pub async fn into_bytes(self) -> Result<Bytes, BackendError> {
        match self {
            ResponseBody::Full(bytes) => Ok(bytes),
            ResponseBody::Stream(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk?);
                }
                Ok(buffer.freeze())
            }
        }
    }
}

/// Minimal async HTTP interface used by the session: a single GET.
///
/// Implementations must not follow redirects; the memento fetcher navigates
/// them itself.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn get(&self, url: &str) -> Result<BackendResponse, BackendError>;
}

/// Production backend built on a pooled `reqwest` client.
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    /// Build a client with connection pooling, gzip decoding, no automatic
    /// redirects, the given user-agent, and an optional per-read timeout.
    pub fn new(user_agent: &str, read_timeout: Option<Duration>) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .gzip(true);
        if let Some(timeout) = read_timeout {
            builder = builder.read_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| BackendError::Request(err.to_string()))?;
        Ok(Self { client })
    }

    fn classify(err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout(err.to_string())
        } else if err.is_connect() {
            BackendError::Connect(err.to_string())
        } else {
            BackendError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn get(&self, url: &str) -> Result<BackendResponse, BackendError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ReqwestBackend::classify)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ReqwestBackend::classify))
            .boxed();

        Ok(BackendResponse::new(
            status,
            headers,
            ResponseBody::Stream(stream),
        ))
    }
}

/// A canned response (or transport error) for [`MockBackend`].
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Scripted backend for tests: responses are served in the order they were
/// pushed, and every requested URL is recorded for assertions.
#[derive(Default)]
pub struct MockBackend {
    queue: Mutex<VecDeque<Result<MockResponse, BackendError>>>,
    requests: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: MockResponse) {
        self.queue.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, error: BackendError) {
        self.queue.lock().unwrap().push_back(Err(error));
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpBackend for MockBackend {
    async fn get(&self, url: &str) -> Result<BackendResponse, BackendError> {
        self.requests.lock().unwrap().push(url.to_string());
        let next = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Request("no scripted response".to_string())));
        next.map(|mock| {
            BackendResponse::new(
                mock.status,
                mock.headers
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str()))
                    .collect(),
                ResponseBody::Full(mock.body),
            )
        })
    }
}
