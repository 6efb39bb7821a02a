//! The public client: CDX search plus memento retrieval.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::archive_url::{format_archive_url, parse_archive_url};
use crate::data::{
    charset_from_content_type, Body, Headers, Memento, MementoOptions, MementoRequest,
    SearchOptions,
};
use crate::error::{Result, WaybackError};
use crate::net::{BackendResponse, Endpoint, Session, SessionConfig};
use crate::search::Search;

static PROTOCOL_AND_WWW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://(www\d*\.)?").unwrap());

/// Wayback normalizes URLs and rewrites playback modes with redirects that
/// stay within the same minute of the requested capture. Anything further
/// away is a genuinely different capture.
const EXACT_REDIRECT_TOLERANCE_SECS: u64 = 60;

/// A client for reading from the Internet Archive's Wayback Machine.
///
/// Wraps a [`Session`] and exposes the two Wayback operations:
/// [`search`](Client::search) over the CDX capture index and
/// [`get_memento`](Client::get_memento) for playing back individual
/// captures.
///
/// ```no_run
/// use wayback::{Client, MementoRequest, MementoOptions, SearchOptions};
///
/// # async fn demo() -> wayback::Result<()> {
/// let client = Client::new()?;
/// let mut results = client.search("nasa.gov", SearchOptions::default())?;
/// while let Some(record) = results.next().await? {
///     let mut memento = client
///         .get_memento(MementoRequest::from(&record), MementoOptions::default())
///         .await?;
///     println!("{}: {}", record.timestamp, memento.text().await?.len());
/// }
/// client.close();
/// # Ok(())
/// # }
/// ```
pub struct Client {
    session: Session,
}

impl Client {
    /// A client with default session settings and a fresh connection pool.
    pub fn new() -> Result<Self> {
        Ok(Self {
            session: Session::new(SessionConfig::default())?,
        })
    }

    /// A client with custom session settings.
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        Ok(Self {
            session: Session::new(config)?,
        })
    }

    /// A client over an existing session (for custom transports).
    pub fn with_session(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Close the underlying session. Subsequent operations fail with
    /// [`WaybackError::SessionClosed`].
    pub fn close(&self) {
        self.session.close();
    }

    /// Search the CDX index for captures of `url`.
    ///
    /// Returns a lazy iterator; no request happens until the first call to
    /// [`Search::next`]. See [`SearchOptions`] for match scope, date bounds,
    /// filters, and paging behavior.
    pub fn search<'a>(&'a self, url: &str, options: SearchOptions) -> Result<Search<'a>> {
        if self.session.is_closed() {
            return Err(WaybackError::SessionClosed);
        }
        Search::new(&self.session, url, options)
    }

    /// Fetch the memento of a URL at a capture time.
    ///
    /// The request can come from a [`CdxRecord`](crate::CdxRecord)
    /// (`MementoRequest::from(&record)`), an archive URL
    /// ([`MementoRequest::from_archive_url`]), or a plain URL and timestamp
    /// ([`MementoRequest::new`]).
    ///
    /// Wayback mixes two kinds of redirects into playback, and this method
    /// untangles them. Redirects the *origin served at capture time* are
    /// part of history: they are followed (up to
    /// [`MementoOptions::max_redirects`]) and recorded as mementos in
    /// [`Memento::history`]. Redirects the *archive* issues to steer us to a
    /// nearby capture are navigation artifacts: they are followed only as
    /// far as [`MementoOptions::exact`] and [`MementoOptions::target_window`]
    /// allow, and appear in [`Memento::debug_history`] only.
    pub async fn get_memento(
        &self,
        request: impl Into<MementoRequest>,
        options: MementoOptions,
    ) -> Result<Memento> {
        if self.session.is_closed() {
            return Err(WaybackError::SessionClosed);
        }

        let request = request.into();
        let exact_redirects = options.exact_redirects.unwrap_or(options.exact);
        let mode = request.mode.clone().unwrap_or_else(|| options.mode.clone());
        let requested_url = request.url;
        let requested_time = request.timestamp;
        let cancel = options.cancel.clone();

        let mut history: Vec<Memento> = Vec::new();
        let mut debug_history: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut previous_was_memento = false;
        let mut historical_hops = 0u32;
        let mut current_url = format_archive_url(&requested_url, &requested_time, &mode);

        loop {
            cancel.check()?;
            let response = self
                .session
                .send(Endpoint::Memento, &current_url, &cancel)
                .await?;

            let is_memento = response.headers.contains("Memento-Datetime");
            let next_url = if (300..400).contains(&response.status) {
                response
                    .headers
                    .get("Location")
                    .map(|location| absolutize(location, &current_url))
            } else {
                None
            };

            if !is_memento {
                let allowed = next_url.as_deref().is_some_and(|next| {
                    archival_redirect_allowed(
                        next,
                        &current_url,
                        requested_time,
                        history.is_empty(),
                        previous_was_memento,
                        &options,
                        exact_redirects,
                    )
                });
                if !allowed {
                    return Err(self
                        .classify_memento_failure(response, &current_url, &requested_url)
                        .await);
                }

                // An archive-internal hop: not a historical fact, so it is
                // recorded in debug_history only.
                let next = next_url.expect("archival redirect has a target");
                response.drain().await;
                visited.insert(current_url.clone());
                if visited.contains(&next) {
                    return Err(WaybackError::MementoPlayback {
                        url: current_url,
                        reason: "the archive's redirects are circular".to_string(),
                    });
                }
                log::debug!("following archive redirect {current_url} -> {next}");
                debug_history.push(current_url);
                previous_was_memento = false;
                current_url = next;
                continue;
            }

            if let Some(next) = next_url {
                // The memento itself is a captured redirect.
                if !options.follow_redirects {
                    return self
                        .assemble_memento(response, &current_url, history, debug_history, false)
                        .await;
                }

                historical_hops += 1;
                if historical_hops > options.max_redirects {
                    response.drain().await;
                    return Err(WaybackError::MementoPlayback {
                        url: current_url,
                        reason: format!(
                            "more than {} redirects were captured",
                            options.max_redirects
                        ),
                    });
                }
                visited.insert(current_url.clone());
                if visited.contains(&next) {
                    response.drain().await;
                    return Err(WaybackError::MementoPlayback {
                        url: current_url,
                        reason: "the captured redirects are circular".to_string(),
                    });
                }

                log::debug!("following captured redirect {current_url} -> {next}");
                let redirect_memento = self
                    .assemble_memento(response, &current_url, Vec::new(), Vec::new(), true)
                    .await?;
                history.push(redirect_memento);
                debug_history.push(current_url);
                previous_was_memento = true;
                current_url = next;
                continue;
            }

            // Terminal memento. Verify the landed capture is close enough to
            // what was asked for, after all archive-internal hops resolved.
            let landed_time = memento_datetime(&response.headers)
                .or_else(|| parse_archive_url(&current_url).ok().map(|(_, time, _)| time));
            if let Some(landed) = landed_time {
                let drift = (landed - requested_time).num_seconds().unsigned_abs();
                if drift > options.target_window {
                    response.drain().await;
                    return Err(WaybackError::MementoPlayback {
                        url: current_url,
                        reason: format!(
                            "the nearest capture is {drift} seconds away, beyond the \
                             {}-second target window",
                            options.target_window
                        ),
                    });
                }
            }

            return self
                .assemble_memento(response, &current_url, history, debug_history, false)
                .await;
        }
    }

    /// Turn a playback response into a [`Memento`].
    ///
    /// `read_body` forces the body into memory (used for history entries so
    /// they never hold a connection open).
    async fn assemble_memento(
        &self,
        response: BackendResponse,
        archive_url: &str,
        history: Vec<Memento>,
        debug_history: Vec<String>,
        read_body: bool,
    ) -> Result<Memento> {
        // Prefer the canonical archive URL the server reports for the landed
        // capture; it resolves SURT normalization the request URL may lack.
        let memento_url = response
            .headers
            .get("Content-Location")
            .map(|location| absolutize(location, archive_url))
            .filter(|candidate| parse_archive_url(candidate).is_ok())
            .unwrap_or_else(|| archive_url.to_string());

        let (url, url_time, mode) = parse_archive_url(&memento_url)?;
        let timestamp = memento_datetime(&response.headers).unwrap_or(url_time);

        let headers = archived_headers(&response.headers, &memento_url);
        let encoding = response
            .headers
            .get("X-Archive-Orig-Content-Type")
            .and_then(charset_from_content_type)
            .or_else(|| {
                response
                    .headers
                    .get("Content-Type")
                    .and_then(charset_from_content_type)
            });
        let links = response
            .headers
            .get("Link")
            .map(crate::core::link::parse_link_header)
            .unwrap_or_default();

        let status_code = response.status;
        let body = if read_body {
            Body::Complete(response.into_bytes().await?)
        } else {
            match response.body {
                crate::net::ResponseBody::Full(bytes) => Body::Complete(bytes),
                crate::net::ResponseBody::Stream(stream) => Body::Open(stream),
            }
        };

        Ok(Memento {
            url,
            timestamp,
            mode,
            memento_url,
            status_code,
            headers,
            encoding,
            links,
            history,
            debug_history,
            body,
        })
    }

    /// Map a non-playback response to the taxonomy, consuming its body.
    async fn classify_memento_failure(
        &self,
        response: BackendResponse,
        archive_url: &str,
        requested_url: &str,
    ) -> WaybackError {
        let status = response.status;
        let runtime_error = response
            .headers
            .get("X-Archive-Wayback-Runtime-Error")
            .unwrap_or_default()
            .to_string();
        let body = response.into_text_lossy().await.unwrap_or_default();
        let patterns = &self.session.config().body_patterns;

        if status == 451
            || runtime_error.contains("AdministrativeAccessControlException")
            || patterns.is_blocked_site(&body)
        {
            WaybackError::BlockedSite {
                url: requested_url.to_string(),
            }
        } else if runtime_error.contains("RobotAccessControlException")
            || patterns.is_blocked_by_robots(&body)
        {
            WaybackError::BlockedByRobots {
                url: requested_url.to_string(),
            }
        } else if status == 404 && patterns.is_no_memento(&body) {
            WaybackError::NoMemento {
                url: requested_url.to_string(),
            }
        } else if patterns.is_rate_limit(&body) {
            WaybackError::RateLimit { retry_after: None }
        } else if !runtime_error.is_empty() {
            WaybackError::MementoPlayback {
                url: archive_url.to_string(),
                reason: runtime_error,
            }
        } else if status < 400 {
            WaybackError::MementoPlayback {
                url: archive_url.to_string(),
                reason: "the archive did not serve a memento".to_string(),
            }
        } else {
            WaybackError::MementoPlayback {
                url: archive_url.to_string(),
                reason: format!("HTTP {status}"),
            }
        }
    }
}

/// Whether an archive-internal redirect may be followed.
///
/// Wayback issues these to steer a request toward the closest-in-time
/// capture of the same URL (or to normalize the URL form). How far the
/// landed capture may drift from the requested time depends on where we are
/// in the chain and on the exactness options.
fn archival_redirect_allowed(
    next_archive_url: &str,
    current_archive_url: &str,
    requested_time: DateTime<Utc>,
    initial_request: bool,
    previous_was_memento: bool,
    options: &MementoOptions,
    exact_redirects: bool,
) -> bool {
    let Ok((target_url, target_time, _)) = parse_archive_url(next_archive_url) else {
        return false;
    };
    let drift = (target_time - requested_time).num_seconds().unsigned_abs();
    let within_window = drift <= options.target_window;
    let within_tolerance = drift <= EXACT_REDIRECT_TOLERANCE_SECS;

    if initial_request {
        if options.exact {
            within_tolerance
        } else {
            within_window
        }
    } else if previous_was_memento {
        // The target of a captured redirect is rarely captured at the same
        // second as the redirect itself; nearby is normal even under strict
        // matching. Under strict matching the target must at least be the
        // URL the captured redirect pointed at.
        within_window
            && (!exact_redirects
                || parse_archive_url(current_archive_url)
                    .map(|(current_url, _, _)| urls_roughly_equal(&current_url, &target_url))
                    .unwrap_or(false))
    } else if exact_redirects {
        within_tolerance
    } else {
        within_window
    }
}

/// Compare original URLs ignoring scheme, `www` prefixes, and case.
fn urls_roughly_equal(left: &str, right: &str) -> bool {
    PROTOCOL_AND_WWW.replace(left, "").to_lowercase()
        == PROTOCOL_AND_WWW.replace(right, "").to_lowercase()
}

/// Resolve a possibly-relative `Location` header against the request URL.
fn absolutize(location: &str, base: &str) -> String {
    match url::Url::parse(base).and_then(|base| base.join(location)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => location.to_string(),
    }
}

fn memento_datetime(headers: &Headers) -> Option<DateTime<Utc>> {
    let value = headers.get("Memento-Datetime")?;
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// The archived origin's headers, recovered from the playback response.
///
/// Historical headers are reproduced with an `X-Archive-Orig-` prefix; the
/// unprefixed `Content-Type` is the played-back original. A redirect's
/// `Location` points at the next *archive* URL, so it is rewritten back to
/// the historical target.
fn archived_headers(raw: &Headers, memento_url: &str) -> Headers {
    const PREFIX: &str = "x-archive-orig-";

    let mut headers = Headers::new();
    for (name, value) in raw.iter() {
        if name.len() > PREFIX.len() && name[..PREFIX.len()].eq_ignore_ascii_case(PREFIX) {
            headers.insert(&name[PREFIX.len()..], value);
        }
    }

    if let Some(content_type) = raw.get("Content-Type") {
        headers.insert("Content-Type", content_type);
    }

    if !headers.contains("Location") {
        if let Some(location) = raw.get("Location") {
            let absolute = absolutize(location, memento_url);
            if let Ok((target, _, _)) = parse_archive_url(&absolute) {
                headers.insert("Location", target);
            }
        }
    }

    headers
}
