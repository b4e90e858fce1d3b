//! Integration tests for the resilient fetcher
//!
//! These tests use wiremock to stand in for the remote site and
//! exercise the classified retry behavior end-to-end.

use squad_scout::cancel::CancelRegistry;
use squad_scout::config::FetchConfig;
use squad_scout::fetch::{Fetch, FetchStatus, ResilientFetcher, SessionPool};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fast retry settings so the backoff sleeps stay sub-second
fn test_fetch_config(max_retries: u32) -> FetchConfig {
    FetchConfig {
        max_retries,
        request_timeout_secs: 5,
        pool_size: 2,
        rate_limit_delay_secs: 0,
        block_delay_secs: 0,
        error_delay_secs: 0,
        max_delay_secs: 1,
    }
}

fn fetcher(config: FetchConfig) -> (ResilientFetcher, Arc<CancelRegistry>) {
    let cancel = Arc::new(CancelRegistry::new());
    let pool = Arc::new(SessionPool::new(config.pool_size, config.request_timeout()));
    (
        ResilientFetcher::new(pool, cancel.clone(), config),
        cancel,
    )
}

#[tokio::test]
async fn test_success_returns_body_on_first_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/club/301"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>roster</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, _) = fetcher(test_fetch_config(3));
    let url = format!("{}/club/301", server.uri());
    let outcome = fetcher.fetch(&url, "team-squads").await;

    assert_eq!(outcome.status, FetchStatus::Ok);
    assert_eq!(outcome.body, "<html>roster</html>");
    assert_eq!(outcome.attempts, 1);
}

#[tokio::test]
async fn test_not_found_is_definitive_and_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/club/999"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, _) = fetcher(test_fetch_config(5));
    let url = format!("{}/club/999", server.uri());
    let outcome = fetcher.fetch(&url, "team-squads").await;

    assert_eq!(outcome.status, FetchStatus::NotFound);
    assert_eq!(outcome.attempts, 1);
    // Wiremock verifies expect(1) when the server drops
}

#[tokio::test]
async fn test_persistent_rate_limiting_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/club/301"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let (fetcher, _) = fetcher(test_fetch_config(3));
    let url = format!("{}/club/301", server.uri());
    let outcome = fetcher.fetch(&url, "team-squads").await;

    assert_eq!(outcome.status, FetchStatus::GaveUp);
    assert_eq!(outcome.attempts, 3);
    // Wiremock verifies expect(3) when the server drops
}

#[tokio::test]
async fn test_transient_error_then_success() {
    let server = MockServer::start().await;
    // First attempt hits a 500, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/club/301"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/club/301"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let (fetcher, _) = fetcher(test_fetch_config(3));
    let url = format!("{}/club/301", server.uri());
    let outcome = fetcher.fetch(&url, "team-squads").await;

    assert_eq!(outcome.status, FetchStatus::Ok);
    assert_eq!(outcome.body, "ok");
    assert_eq!(outcome.attempts, 2);
}

#[tokio::test]
async fn test_cancel_before_first_attempt_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (fetcher, cancel) = fetcher(test_fetch_config(3));
    cancel.set("team-squads");

    let url = format!("{}/club/301", server.uri());
    let outcome = fetcher.fetch(&url, "team-squads").await;

    assert_eq!(outcome.status, FetchStatus::Cancelled);
    assert_eq!(outcome.attempts, 0);
    // Wiremock verifies expect(0) when the server drops
}

#[tokio::test]
async fn test_blocked_response_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/club/301"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/club/301"))
        .respond_with(ResponseTemplate::new(200).set_body_string("back in"))
        .mount(&server)
        .await;

    let (fetcher, _) = fetcher(test_fetch_config(3));
    let url = format!("{}/club/301", server.uri());
    let outcome = fetcher.fetch(&url, "team-squads").await;

    assert_eq!(outcome.status, FetchStatus::Ok);
    assert_eq!(outcome.body, "back in");
}
