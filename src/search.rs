//! Lazy, paginated iteration over CDX search results.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use futures_util::Stream;
use url::Url;

use crate::core::cdx::{is_malformed_url, parse_cdx_line};
use crate::core::patterns::BodyPatterns;
use crate::data::{CdxRecord, MatchType, SearchOptions};
use crate::error::{Result, WaybackError};
use crate::net::{CancelToken, Endpoint, Session};

pub(crate) const CDX_SEARCH_URL: &str = "https://web.archive.org/cdx/search/cdx";

/// The fully-resolved parameters of one CDX search.
#[derive(Debug, Clone)]
pub(crate) struct SearchQuery {
    url: String,
    match_type: Option<MatchType>,
    from: Option<String>,
    to: Option<String>,
    limit: i64,
    fast_latest: Option<bool>,
    resolve_revisits: bool,
    filters: Vec<String>,
    collapse: Option<String>,
}

impl SearchQuery {
    pub(crate) fn resolve(url: &str, options: &SearchOptions) -> Result<Self> {
        if url.is_empty() {
            return Err(WaybackError::InvalidQuery(
                "search URL must not be empty".to_string(),
            ));
        }

        let (url, match_type) = match url.strip_suffix('*') {
            Some(stripped) => {
                if options.match_type.is_some() {
                    return Err(WaybackError::InvalidQuery(
                        "do not combine an explicit match_type with a URL ending in `*`"
                            .to_string(),
                    ));
                }
                if stripped.is_empty() {
                    return Err(WaybackError::InvalidQuery(
                        "search URL must not be empty".to_string(),
                    ));
                }
                (stripped.to_string(), Some(MatchType::Prefix))
            }
            None => (url.to_string(), options.match_type),
        };

        if options.limit == 0 {
            return Err(WaybackError::InvalidQuery(
                "limit must be positive (first N) or negative (last N)".to_string(),
            ));
        }

        // fastLatest trades exact sizing for speed; it only makes sense when
        // asking for the newest captures.
        let fast_latest = options
            .fast_latest
            .or((options.limit < 0).then_some(true));

        Ok(Self {
            url,
            match_type,
            from: options.from_date.map(|date| date.to_query(false)),
            to: options.to_date.map(|date| date.to_query(true)),
            limit: options.limit,
            fast_latest,
            resolve_revisits: options.resolve_revisits,
            filters: options.filters.clone(),
            collapse: options.collapse.clone(),
        })
    }
}

/// Build the request URL for one page of results.
pub(crate) fn page_url(query: &SearchQuery, resume_key: Option<&str>) -> String {
    let mut endpoint = Url::parse(CDX_SEARCH_URL).expect("the CDX endpoint URL is valid");
    {
        let mut pairs = endpoint.query_pairs_mut();
        pairs.append_pair("url", &query.url);
        if let Some(match_type) = query.match_type {
            pairs.append_pair("matchType", match_type.as_str());
        }
        if let Some(from) = &query.from {
            pairs.append_pair("from", from);
        }
        if let Some(to) = &query.to {
            pairs.append_pair("to", to);
        }
        pairs.append_pair("limit", &query.limit.to_string());
        if let Some(fast_latest) = query.fast_latest {
            pairs.append_pair("fastLatest", if fast_latest { "true" } else { "false" });
        }
        pairs.append_pair(
            "resolveRevisits",
            if query.resolve_revisits { "true" } else { "false" },
        );
        for filter in &query.filters {
            pairs.append_pair("filter", filter);
        }
        if let Some(collapse) = &query.collapse {
            pairs.append_pair("collapse", collapse);
        }
        // Always ask for a resume key; it is the only reliable way to page
        // through large result sets.
        pairs.append_pair("showResumeKey", "true");
        if let Some(resume_key) = resume_key {
            pairs.append_pair("resumeKey", resume_key);
        }
    }
    endpoint.into()
}

/// A lazy iterator over CDX capture records.
///
/// Pages are fetched on demand as [`next`](Search::next) consumes them; the
/// CDX resume-key protocol, duplicate suppression, and blocked-result
/// handling all happen behind it. Records arrive in the server's order
/// (ascending timestamp within a key).
///
/// If a page request fails after the session's retries are exhausted, the
/// error propagates out of `next` and the iterator is finished; records
/// already yielded remain valid.
pub struct Search<'a> {
    session: &'a Session,
    query: SearchQuery,
    skip_malformed: bool,
    cancel: CancelToken,
    lines: VecDeque<String>,
    resume_key: Option<String>,
    started: bool,
    done: bool,
    last_fingerprint: Option<(DateTime<Utc>, String, String)>,
}

impl<'a> Search<'a> {
    pub(crate) fn new(session: &'a Session, url: &str, options: SearchOptions) -> Result<Self> {
        let query = SearchQuery::resolve(url, &options)?;
        Ok(Self {
            session,
            query,
            skip_malformed: options.skip_malformed_results,
            cancel: options.cancel,
            lines: VecDeque::new(),
            resume_key: None,
            started: false,
            done: false,
            last_fingerprint: None,
        })
    }

    /// The next capture record, or `None` when the results are exhausted.
    pub async fn next(&mut self) -> Result<Option<CdxRecord>> {
        loop {
            if self.done {
                return Ok(None);
            }
            if let Some(line) = self.lines.pop_front() {
                if line.is_empty() {
                    // A blank line marks the resume-key sentinel; the token
                    // on the following line continues the query.
                    self.resume_key = self.lines.pop_front();
                    self.lines.clear();
                    continue;
                }
                match self.handle_line(&line) {
                    Ok(Some(record)) => return Ok(Some(record)),
                    Ok(None) => continue,
                    Err(err) => {
                        self.done = true;
                        return Err(err);
                    }
                }
            } else if !self.started || self.resume_key.is_some() {
                self.fetch_page().await?;
            } else {
                self.done = true;
            }
        }
    }

    /// Adapt this iterator into a [`Stream`] of records.
    pub fn stream(self) -> impl Stream<Item = Result<CdxRecord>> + 'a {
        futures_util::stream::unfold(self, |mut search| async move {
            match search.next().await {
                Ok(Some(record)) => Some((Ok(record), search)),
                Ok(None) => None,
                Err(err) => Some((Err(err), search)),
            }
        })
    }

    fn handle_line(&mut self, line: &str) -> Result<Option<CdxRecord>> {
        let patterns = &self.session.config().body_patterns;
        let record = match parse_cdx_line(line) {
            Ok(record) => record,
            Err(err) => {
                // Mid-body error notices take the place of a record line.
                if patterns.is_blocked_by_robots(line) {
                    return Err(WaybackError::BlockedByRobots {
                        url: self.query.url.clone(),
                    });
                }
                if patterns.is_rate_limit(line) {
                    return Err(WaybackError::RateLimit { retry_after: None });
                }
                return Err(err);
            }
        };

        if self.skip_malformed && is_malformed_url(&record.url) {
            log::debug!("skipping malformed capture URL {}", record.url);
            return Ok(None);
        }

        let fingerprint = (
            record.timestamp,
            record.url.clone(),
            record.digest.clone(),
        );
        if self.last_fingerprint.as_ref() == Some(&fingerprint) {
            log::debug!("skipping repeated CDX row for {}", record.url);
            return Ok(None);
        }
        self.last_fingerprint = Some(fingerprint);
        Ok(Some(record))
    }

    async fn fetch_page(&mut self) -> Result<()> {
        if let Err(err) = self.cancel.check() {
            self.done = true;
            return Err(err);
        }

        let first_page = !self.started;
        self.started = true;
        let resume_key = self.resume_key.take();
        let request_url = page_url(&self.query, resume_key.as_deref());
        log::debug!("fetching CDX page: {request_url}");

        let response = match self
            .session
            .send(Endpoint::Search, &request_url, &self.cancel)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                self.done = true;
                return Err(err);
            }
        };

        let status = response.status;
        let body = match response.into_text_lossy().await {
            Ok(body) => body,
            Err(err) => {
                self.done = true;
                return Err(err.into());
            }
        };

        if status != 200 {
            self.done = true;
            let error = classify_search_failure(
                status,
                &body,
                &self.session.config().body_patterns,
                &self.query.url,
            );
            if !first_page
                && matches!(
                    error,
                    WaybackError::BlockedByRobots { .. } | WaybackError::BlockedSite { .. }
                )
            {
                // A block appearing mid-search ends it cleanly; everything
                // already yielded was served unblocked.
                log::debug!("CDX page blocked after {status}; ending iteration");
                return Ok(());
            }
            return Err(error);
        }

        self.lines = body.lines().map(str::to_string).collect();
        Ok(())
    }
}

fn classify_search_failure(
    status: u16,
    body: &str,
    patterns: &BodyPatterns,
    url: &str,
) -> WaybackError {
    if patterns.is_blocked_site(body) {
        WaybackError::BlockedSite {
            url: url.to_string(),
        }
    } else if status == 403 || patterns.is_blocked_by_robots(body) {
        WaybackError::BlockedByRobots {
            url: url.to_string(),
        }
    } else if patterns.is_rate_limit(body) {
        WaybackError::RateLimit { retry_after: None }
    } else {
        WaybackError::Network(crate::net::BackendError::Request(format!(
            "CDX search failed with HTTP {status}"
        )))
    }
}
