//! End-to-end memento retrieval against a scripted transport.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use wayback::{
    Client, MementoOptions, MementoRequest, MockBackend, MockResponse, Mode, Session,
    SessionConfig, WaybackError,
};

fn client_with_backend(config: SessionConfig) -> (Arc<MockBackend>, Client) {
    let backend = Arc::new(MockBackend::new());
    let session = Session::with_backend(config, backend.clone());
    (backend, Client::with_session(session))
}

fn fast_config() -> SessionConfig {
    SessionConfig::default()
        .search_calls_per_second(0.0)
        .memento_calls_per_second(0.0)
}

fn memento_response(datetime: &str, body: &str) -> MockResponse {
    MockResponse::new(200, body.to_string())
        .header("Memento-Datetime", datetime)
        .header("Content-Type", "text/html; charset=UTF-8")
        .header("X-Archive-Orig-Date", datetime)
        .header("X-Archive-Orig-Server", "Apache")
}

fn noaa_request() -> MementoRequest {
    MementoRequest::new(
        "http://www.noaa.gov/",
        Utc.with_ymd_and_hms(2018, 8, 1, 0, 0, 0).unwrap(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_simple_memento() {
    let (backend, client) = client_with_backend(fast_config());
    backend.push(
        memento_response("Wed, 01 Aug 2018 00:00:00 GMT", "<html>noaa</html>").header(
            "Link",
            "<http://www.noaa.gov/>; rel=\"original\", \
             <https://web.archive.org/web/timemap/link/http://www.noaa.gov/>; rel=\"timemap\"",
        ),
    );

    let mut memento = client
        .get_memento(noaa_request(), MementoOptions::default())
        .await
        .unwrap();

    assert_eq!(memento.url, "http://www.noaa.gov/");
    assert_eq!(
        memento.timestamp,
        Utc.with_ymd_and_hms(2018, 8, 1, 0, 0, 0).unwrap()
    );
    assert_eq!(memento.mode, Mode::Original);
    assert_eq!(
        memento.memento_url,
        "https://web.archive.org/web/20180801000000id_/http://www.noaa.gov/"
    );
    assert_eq!(memento.status_code, 200);
    assert!(memento.ok());
    assert!(!memento.is_redirect());
    assert!(memento.history.is_empty());
    assert!(memento.debug_history.is_empty());

    // Archived headers: stripped of archive metadata, case-insensitive.
    assert_eq!(memento.headers.get("server"), Some("Apache"));
    assert_eq!(memento.headers.get("DATE"), Some("Wed, 01 Aug 2018 00:00:00 GMT"));
    assert!(!memento.headers.contains("Memento-Datetime"));

    assert_eq!(memento.encoding.as_deref(), Some("utf-8"));
    assert_eq!(memento.links["original"].url, "http://www.noaa.gov/");
    assert!(memento.links.contains_key("timemap"));

    assert_eq!(memento.text().await.unwrap(), "<html>noaa</html>");

    // The memento URL parses back to the memento's own identity.
    let (url, timestamp, mode) = wayback::parse_archive_url(&memento.memento_url).unwrap();
    assert_eq!(url, memento.url);
    assert_eq!(timestamp, memento.timestamp);
    assert_eq!(mode, memento.mode);

    assert_eq!(
        backend.requests(),
        vec!["https://web.archive.org/web/20180801000000id_/http://www.noaa.gov/"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_closest_in_time_with_exact_disabled() {
    let (backend, client) = client_with_backend(fast_config());
    backend.push(
        MockResponse::new(302, "").header(
            "Location",
            "/web/20180801123456id_/http://www.noaa.gov/",
        ),
    );
    backend.push(memento_response(
        "Wed, 01 Aug 2018 12:34:56 GMT",
        "<html>later that day</html>",
    ));

    let memento = client
        .get_memento(noaa_request(), MementoOptions::default().exact(false))
        .await
        .unwrap();

    assert_eq!(memento.url, "http://www.noaa.gov/");
    let requested = Utc.with_ymd_and_hms(2018, 8, 1, 0, 0, 0).unwrap();
    let drift = (memento.timestamp - requested).num_seconds().unsigned_abs();
    assert!(drift <= 86_400);
    assert!(memento
        .memento_url
        .starts_with("https://web.archive.org/web/"));

    // The archive's own redirect is a navigation artifact: debug only.
    assert!(memento.history.is_empty());
    assert_eq!(
        memento.debug_history,
        vec!["https://web.archive.org/web/20180801000000id_/http://www.noaa.gov/"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_exact_mode_refuses_distant_capture() {
    let (backend, client) = client_with_backend(fast_config());
    backend.push(
        MockResponse::new(302, "").header(
            "Location",
            "/web/20180801123456id_/http://www.noaa.gov/",
        ),
    );

    let err = client
        .get_memento(noaa_request(), MementoOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WaybackError::MementoPlayback { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_target_window_bounds_archival_redirects() {
    let (backend, client) = client_with_backend(fast_config());
    // Two months away: outside the 24-hour default window.
    backend.push(
        MockResponse::new(302, "").header(
            "Location",
            "/web/20181001000000id_/http://www.noaa.gov/",
        ),
    );

    let err = client
        .get_memento(noaa_request(), MementoOptions::default().exact(false))
        .await
        .unwrap_err();
    assert!(matches!(err, WaybackError::MementoPlayback { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_historical_redirect_is_followed_and_recorded() {
    let (backend, client) = client_with_backend(fast_config());
    backend.push(
        MockResponse::new(301, "moved")
            .header("Memento-Datetime", "Wed, 01 Aug 2018 00:00:00 GMT")
            .header(
                "Location",
                "https://web.archive.org/web/20180801000100id_/http://www.noaa.gov/new-home",
            ),
    );
    backend.push(memento_response(
        "Wed, 01 Aug 2018 00:01:00 GMT",
        "<html>new home</html>",
    ));

    let memento = client
        .get_memento(noaa_request(), MementoOptions::default())
        .await
        .unwrap();

    assert_eq!(memento.url, "http://www.noaa.gov/new-home");
    assert_eq!(memento.status_code, 200);
    assert_eq!(memento.history.len(), 1);

    let redirect = &memento.history[0];
    assert_eq!(redirect.status_code, 301);
    assert!(redirect.is_redirect());
    assert_eq!(redirect.url, "http://www.noaa.gov/");
    // The captured redirect's Location is rewritten to the historical
    // target, not the archive URL.
    assert_eq!(
        redirect.headers.get("Location"),
        Some("http://www.noaa.gov/new-home")
    );

    assert_eq!(
        memento.debug_history,
        vec!["https://web.archive.org/web/20180801000000id_/http://www.noaa.gov/"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_follow_redirects_disabled_returns_the_redirect() {
    let (backend, client) = client_with_backend(fast_config());
    backend.push(
        MockResponse::new(301, "moved")
            .header("Memento-Datetime", "Wed, 01 Aug 2018 00:00:00 GMT")
            .header(
                "Location",
                "https://web.archive.org/web/20180801000100id_/http://www.noaa.gov/new-home",
            ),
    );

    let memento = client
        .get_memento(
            noaa_request(),
            MementoOptions::default().follow_redirects(false),
        )
        .await
        .unwrap();

    assert_eq!(memento.status_code, 301);
    assert!(memento.is_redirect());
    assert_eq!(memento.url, "http://www.noaa.gov/");
    assert!(memento.history.is_empty());
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_redirect_chain_cap() {
    let (backend, client) = client_with_backend(fast_config());
    for hop in 0..4 {
        backend.push(
            MockResponse::new(301, "moved")
                .header("Memento-Datetime", "Wed, 01 Aug 2018 00:00:00 GMT")
                .header(
                    "Location",
                    format!(
                        "https://web.archive.org/web/20180801000000id_/http://www.noaa.gov/hop{}",
                        hop + 1
                    ),
                ),
        );
    }

    let options = MementoOptions {
        max_redirects: 3,
        ..MementoOptions::default()
    };
    let err = client.get_memento(noaa_request(), options).await.unwrap_err();
    match err {
        WaybackError::MementoPlayback { reason, .. } => assert!(reason.contains("redirects")),
        other => panic!("expected MementoPlayback, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_circular_redirects_are_an_error() {
    let (backend, client) = client_with_backend(fast_config());
    backend.push(
        MockResponse::new(301, "moved")
            .header("Memento-Datetime", "Wed, 01 Aug 2018 00:00:00 GMT")
            .header(
                "Location",
                "https://web.archive.org/web/20180801000000id_/http://www.noaa.gov/b",
            ),
    );
    backend.push(
        MockResponse::new(301, "moved")
            .header("Memento-Datetime", "Wed, 01 Aug 2018 00:00:00 GMT")
            .header(
                "Location",
                "https://web.archive.org/web/20180801000000id_/http://www.noaa.gov/",
            ),
    );

    let err = client
        .get_memento(noaa_request(), MementoOptions::default())
        .await
        .unwrap_err();
    match err {
        WaybackError::MementoPlayback { reason, .. } => assert!(reason.contains("circular")),
        other => panic!("expected MementoPlayback, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_memento_maps_404() {
    let (backend, client) = client_with_backend(fast_config());
    backend.push(MockResponse::new(
        404,
        "<html>The requested URL is not in archive.</html>",
    ));

    let err = client
        .get_memento(noaa_request(), MementoOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WaybackError::NoMemento { url } if url == "http://www.noaa.gov/"));
}

#[tokio::test(start_paused = true)]
async fn test_blocked_site_maps_451_and_body() {
    let (backend, client) = client_with_backend(fast_config());
    backend.push(MockResponse::new(451, "unavailable for legal reasons"));

    let err = client
        .get_memento(noaa_request(), MementoOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WaybackError::BlockedSite { .. }));

    backend.push(MockResponse::new(403, "This URL has been excluded from the Wayback Machine."));
    let err = client
        .get_memento(noaa_request(), MementoOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WaybackError::BlockedSite { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_robots_block_from_runtime_error_header() {
    let (backend, client) = client_with_backend(fast_config());
    backend.push(MockResponse::new(403, "").header(
        "X-Archive-Wayback-Runtime-Error",
        "RobotAccessControlException: Blocked By Robots",
    ));

    let err = client
        .get_memento(noaa_request(), MementoOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WaybackError::BlockedByRobots { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_playback_error_carries_runtime_message() {
    let (backend, client) = client_with_backend(fast_config());
    backend.push(MockResponse::new(503, "").header(
        "X-Archive-Wayback-Runtime-Error",
        "ResourceNotAvailableException: cannot locate resource",
    ));
    // 503 is retried; exhaust the budget with the same answer.
    for _ in 0..3 {
        backend.push(MockResponse::new(503, "").header(
            "X-Archive-Wayback-Runtime-Error",
            "ResourceNotAvailableException: cannot locate resource",
        ));
    }

    let err = client
        .get_memento(noaa_request(), MementoOptions::default())
        .await
        .unwrap_err();
    match err {
        WaybackError::MementoPlayback { reason, .. } => {
            assert!(reason.contains("ResourceNotAvailableException"));
        }
        other => panic!("expected MementoPlayback, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_archived_429_is_historical_data() {
    let (backend, client) = client_with_backend(fast_config());
    backend.push(
        MockResponse::new(429, "the origin was rate limiting when captured")
            .header("Memento-Datetime", "Wed, 01 Aug 2018 00:00:00 GMT")
            .header("Content-Type", "text/html"),
    );

    let memento = client
        .get_memento(noaa_request(), MementoOptions::default())
        .await
        .unwrap();
    assert_eq!(memento.status_code, 429);
    assert!(!memento.ok());
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_archive_rate_limit_applies_cooldown_and_retry_after() {
    use tokio::time::Instant;

    let (backend, client) = client_with_backend(fast_config().memento_retries(1));
    backend.push(MockResponse::new(429, "slow down").header("Retry-After", "30"));
    backend.push(MockResponse::new(429, "slow down").header("Retry-After", "30"));

    let started = Instant::now();
    let err = client
        .get_memento(noaa_request(), MementoOptions::default())
        .await
        .unwrap_err();
    match err {
        WaybackError::RateLimit { retry_after } => assert_eq!(retry_after, Some(30)),
        other => panic!("expected RateLimit, got {other:?}"),
    }
    // Policy floor: a 429 cooldown is at least 60 seconds, even though the
    // server only asked for 30.
    assert!(started.elapsed() >= std::time::Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_request_from_archive_url() {
    let (backend, client) = client_with_backend(fast_config());
    backend.push(memento_response(
        "Thu, 16 Aug 2018 11:19:11 GMT",
        "<html>sp</html>",
    ));

    let request = MementoRequest::from_archive_url(
        "https://web.archive.org/web/20180816111911id_/http://www.nws.noaa.gov/sp/",
    )
    .unwrap();
    let memento = client
        .get_memento(request, MementoOptions::default())
        .await
        .unwrap();
    assert_eq!(memento.url, "http://www.nws.noaa.gov/sp/");
    assert_eq!(
        backend.requests(),
        vec!["https://web.archive.org/web/20180816111911id_/http://www.nws.noaa.gov/sp/"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_content_location_canonicalizes_memento_url() {
    let (backend, client) = client_with_backend(fast_config());
    backend.push(
        memento_response("Wed, 01 Aug 2018 00:00:00 GMT", "<html>ok</html>").header(
            "Content-Location",
            "/web/20180801000000id_/https://www.noaa.gov/",
        ),
    );

    let memento = client
        .get_memento(noaa_request(), MementoOptions::default())
        .await
        .unwrap();
    assert_eq!(
        memento.memento_url,
        "https://web.archive.org/web/20180801000000id_/https://www.noaa.gov/"
    );
    assert_eq!(memento.url, "https://www.noaa.gov/");
}

#[tokio::test(start_paused = true)]
async fn test_closed_session_rejects_memento() {
    let (_backend, client) = client_with_backend(fast_config());
    client.close();
    let err = client
        .get_memento(noaa_request(), MementoOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WaybackError::SessionClosed));
}

#[tokio::test(start_paused = true)]
async fn test_memento_close_releases_body() {
    let (backend, client) = client_with_backend(fast_config());
    backend.push(memento_response("Wed, 01 Aug 2018 00:00:00 GMT", "body"));

    let mut memento = client
        .get_memento(noaa_request(), MementoOptions::default())
        .await
        .unwrap();
    // The mock serves complete bodies, so content stays readable after
    // close; close itself must always be safe to call.
    memento.close();
    assert_eq!(memento.content().await.unwrap().as_ref(), b"body");
}
