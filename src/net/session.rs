//! The session layer: one pooled HTTP client plus the retry, rate-limit,
//! timeout, and close semantics shared by every Wayback operation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::core::backoff::retry_delay;
use crate::core::patterns::BodyPatterns;
use crate::error::{Result, WaybackError};
use crate::net::backend::{BackendResponse, HttpBackend, ReqwestBackend};
use crate::net::cancel::CancelToken;
use crate::net::limit::RateLimiter;

/// HTTP statuses that indicate a transient server-side fault.
///
/// Wayback produces 500s for conditions that clear up on their own, so 5xx
/// statuses are retried here even though they usually would not be. A
/// response carrying `Memento-Datetime` is a playback of *archived* history
/// and is never retried, whatever its status.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

fn default_user_agent() -> String {
    format!(
        "wayback/{} (+https://crates.io/crates/wayback)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Which logical endpoint a request is for. Each endpoint has its own retry
/// budget and rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Search,
    Memento,
}

/// Tunable session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum retries for CDX search requests. Default: 6.
    pub search_retries: u32,
    /// Maximum retries for memento playback requests. Default: 3.
    pub memento_retries: u32,
    /// Base of the exponential backoff between retries. Default: 2 s.
    pub backoff: Duration,
    /// Upper bound on a single backoff sleep. Default: 60 s.
    pub backoff_cap: Duration,
    /// Minimum cooldown after an archive-side 429, regardless of backoff
    /// and `Retry-After`. Default: 60 s.
    pub rate_limit_cooldown: Duration,
    /// Per-read socket timeout. `None` disables it. Default: 60 s.
    pub timeout: Option<Duration>,
    /// Maximum CDX search calls per second. Default: 1.
    pub search_calls_per_second: f64,
    /// Maximum memento playback calls per second. Default: 30.
    pub memento_calls_per_second: f64,
    /// User-Agent header. `None` uses `wayback/<version> (+<source-url>)`.
    pub user_agent: Option<String>,
    /// Body matchers for blocked/missing/rate-limit signals.
    pub body_patterns: BodyPatterns,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            search_retries: 6,
            memento_retries: 3,
            backoff: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(60),
            rate_limit_cooldown: Duration::from_secs(60),
            timeout: Some(Duration::from_secs(60)),
            search_calls_per_second: 1.0,
            memento_calls_per_second: 30.0,
            user_agent: None,
            body_patterns: BodyPatterns::default(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn search_retries(mut self, retries: u32) -> Self {
        self.search_retries = retries;
        self
    }

    #[must_use]
    pub fn memento_retries(mut self, retries: u32) -> Self {
        self.memento_retries = retries;
        self
    }

    #[must_use]
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn search_calls_per_second(mut self, rate: f64) -> Self {
        self.search_calls_per_second = rate;
        self
    }

    #[must_use]
    pub fn memento_calls_per_second(mut self, rate: f64) -> Self {
        self.memento_calls_per_second = rate;
        self
    }

    #[must_use]
    pub fn body_patterns(mut self, patterns: BodyPatterns) -> Self {
        self.body_patterns = patterns;
        self
    }

    fn effective_user_agent(&self) -> String {
        self.user_agent.clone().unwrap_or_else(default_user_agent)
    }
}

/// A pooled connection to the Wayback Machine.
///
/// One session owns one connection pool and one pair of rate limiters. It is
/// meant to be used by one caller at a time; spin up one session per
/// concurrent user. After [`close`](Session::close), every operation fails
/// with [`WaybackError::SessionClosed`].
pub struct Session {
    backend: Mutex<Option<Arc<dyn HttpBackend>>>,
    config: SessionConfig,
    search_limiter: RateLimiter,
    memento_limiter: RateLimiter,
}

impl Session {
    /// A session over a real `reqwest` connection pool.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let backend = ReqwestBackend::new(&config.effective_user_agent(), config.timeout)?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    /// A session over any transport, primarily for tests.
    pub fn with_backend(config: SessionConfig, backend: Arc<dyn HttpBackend>) -> Self {
        Self {
            search_limiter: RateLimiter::new(config.search_calls_per_second),
            memento_limiter: RateLimiter::new(config.memento_calls_per_second),
            backend: Mutex::new(Some(backend)),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Close the session, dropping the connection pool once in-flight
    /// requests complete. Subsequent operations fail with
    /// [`WaybackError::SessionClosed`]. Idempotent.
    pub fn close(&self) {
        self.backend.lock().unwrap().take();
    }

    pub fn is_closed(&self) -> bool {
        self.backend.lock().unwrap().is_none()
    }

    fn checked_backend(&self) -> Result<Arc<dyn HttpBackend>> {
        self.backend
            .lock()
            .unwrap()
            .clone()
            .ok_or(WaybackError::SessionClosed)
    }

    /// Issue a GET with the endpoint's rate limiting and retry policy.
    ///
    /// Transient faults (connect errors, read timeouts, retryable statuses)
    /// are retried with exponential backoff; failed-attempt bodies are
    /// drained before the next try so pooled connections stay reusable. A
    /// final 429 surfaces as [`WaybackError::RateLimit`]; exhausted
    /// transport faults as [`WaybackError::RetriesExhausted`].
    pub(crate) async fn send(
        &self,
        endpoint: Endpoint,
        url: &str,
        cancel: &CancelToken,
    ) -> Result<BackendResponse> {
        let (max_retries, limiter) = match endpoint {
            Endpoint::Search => (self.config.search_retries, &self.search_limiter),
            Endpoint::Memento => (self.config.memento_retries, &self.memento_limiter),
        };

        let started = Instant::now();
        let mut retries = 0u32;
        loop {
            let backend = self.checked_backend()?;
            cancel.check()?;
            limiter.acquire().await;
            cancel.check()?;

            match backend.get(url).await {
                Ok(response) => {
                    // A memento may be a capture *of* an error response, so
                    // playback responses are returned as-is.
                    let is_memento = response.headers.contains("Memento-Datetime");
                    let retryable =
                        !is_memento && RETRYABLE_STATUSES.contains(&response.status);

                    if !retryable || retries >= max_retries {
                        if !is_memento && response.status == 429 {
                            let retry_after = parse_retry_after(&response.headers);
                            response.drain().await;
                            return Err(WaybackError::RateLimit { retry_after });
                        }
                        return Ok(response);
                    }

                    log::debug!(
                        "retrying {url} after status {} (retry {})",
                        response.status,
                        retries + 1
                    );
                    let mut delay =
                        retry_delay(retries, self.config.backoff, self.config.backoff_cap);
                    if response.status == 429 {
                        let retry_after = parse_retry_after(&response.headers)
                            .map(Duration::from_secs)
                            .unwrap_or(Duration::ZERO);
                        delay = delay.max(retry_after).max(self.config.rate_limit_cooldown);
                    }
                    response.drain().await;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    retries += 1;
                }
                Err(err) if err.is_retryable() => {
                    if retries >= max_retries {
                        return Err(WaybackError::RetriesExhausted {
                            retries,
                            elapsed: started.elapsed(),
                            cause: Box::new(err.into()),
                        });
                    }
                    log::debug!("retrying {url} after {err} (retry {})", retries + 1);
                    let delay =
                        retry_delay(retries, self.config.backoff, self.config.backoff_cap);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    retries += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Read a `Retry-After` header as whole seconds. Accepts the delta-seconds
/// form and the HTTP-date form.
fn parse_retry_after(headers: &crate::data::Headers) -> Option<u64> {
    let value = headers.get("Retry-After")?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }
    let date: DateTime<Utc> = DateTime::parse_from_rfc2822(value)
        .ok()?
        .with_timezone(&Utc);
    let delta = (date - Utc::now()).num_seconds();
    Some(delta.max(0) as u64)
}
