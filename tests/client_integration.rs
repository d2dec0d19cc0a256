//! Integration tests for the rate-limited GitHub client using wiremock

use chrono::Utc;
use core::time::Duration;
use gh_census::config::Config;
use gh_census::facts::{ClientOptions, ErrorKind, RateLimitedClient};
use serde_json::json;
use std::time::Instant;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer) -> Config {
    Config {
        api_base_url: server.uri(),
        max_retries: 3,
        backoff_base_ms: 1,
        backoff_max_ms: 5,
        max_wait_secs: 5,
        request_timeout_secs: 5,
        ..Config::default()
    }
}

fn client(server: &MockServer, token: Option<&str>) -> RateLimitedClient {
    RateLimitedClient::new(ClientOptions::from_config(&test_config(server), token)).expect("client should build")
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "octocat" })))
        .mount(&server)
        .await;

    let resp = client(&server, None).get("/users/octocat").await.expect("should succeed after retries");
    assert_eq!(resp.status(), 200);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_transient_failures_exhaust_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server, None).get("/users/octocat").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, None).get("/users/ghost").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_unauthorized_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, Some("expired")).get("/users/octocat").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fatal);
    assert_eq!(err.status(), Some(401));
    assert!(!err.to_string().contains("Bad credentials"));
}

#[tokio::test]
async fn test_forbidden_without_rate_limit_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, None).get("/users/octocat").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fatal);
}

#[tokio::test]
async fn test_rate_limit_within_ceiling_waits_and_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "octocat" })))
        .mount(&server)
        .await;

    let start = Instant::now();
    let resp = client(&server, None).get("/users/octocat").await.expect("should succeed after waiting");
    assert_eq!(resp.status(), 200);
    assert!(start.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
async fn test_rate_limit_beyond_ceiling_fails() {
    let server = MockServer::start().await;
    let reset = Utc::now().timestamp() + 3600;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-limit", "60")
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", reset.to_string().as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let start = Instant::now();
    let err = client(&server, None).get("/users/octocat").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    assert!(start.elapsed() < Duration::from_secs(2), "should fail without waiting");
}

#[tokio::test]
async fn test_repeated_rate_limits_share_one_wait_ceiling() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .expect(3)
        .mount(&server)
        .await;

    let config = Config {
        max_wait_secs: 2,
        ..test_config(&server)
    };
    let client = RateLimitedClient::new(ClientOptions::from_config(&config, None)).unwrap();

    let start = Instant::now();
    let err = client.get("/users/octocat").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(1900), "both one-second waits fit the ceiling");
    assert!(elapsed < Duration::from_secs(4), "a third wait would exceed the ceiling");
}

#[tokio::test]
async fn test_rate_limit_waits_do_not_use_retry_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "octocat" })))
        .with_priority(3)
        .mount(&server)
        .await;

    let config = Config {
        max_retries: 2,
        ..test_config(&server)
    };
    let client = RateLimitedClient::new(ClientOptions::from_config(&config, None)).unwrap();

    let resp = client.get("/users/octocat").await.expect("one transient failure fits two attempts");
    assert_eq!(resp.status(), 200);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_requests_carry_token_and_media_type() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .and(header("authorization", "Bearer s3cret"))
        .and(header("accept", "application/vnd.github+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "octocat" })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client(&server, Some("s3cret")).get("/users/octocat").await.expect("headers should match");
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_rate_limit_status() {
    let server = MockServer::start().await;
    let reset = Utc::now().timestamp() + 1800;

    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": { "core": { "limit": 5000, "remaining": 4321, "reset": reset, "used": 679 } },
            "rate": { "limit": 5000, "remaining": 4321, "reset": reset, "used": 679 }
        })))
        .mount(&server)
        .await;

    let client = client(&server, Some("token"));
    let info = client.rate_limit_status().await.expect("status should parse");

    assert_eq!(info.limit, Some(5000));
    assert_eq!(info.remaining, 4321);
    assert_eq!(info.reset_at.timestamp(), reset);
    assert!(client.bucket().available() <= 4321.0);
}

#[tokio::test]
async fn test_rate_limit_status_with_bad_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server, Some("nope")).rate_limit_status().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fatal);
}
