//! GitHub REST client
//!
//! Every request draws from a shared [`TokenBucket`], retries transient
//! failures under a [`RetryPolicy`], and waits out provider rate limits up to a
//! configured ceiling.

use super::{FetchError, RetryPolicy, TokenBucket};
use crate::config::Config;
use chrono::{DateTime, TimeDelta, Utc};
use core::time::Duration;
use layered::{Execute, Service, Stack};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use seatbelt::ResilienceContext;
use seatbelt::retry::{Backoff, Retry};
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};
use tick::Clock;

const LOG_TARGET: &str = "    client";

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("gh-census/", env!("CARGO_PKG_VERSION"));
const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Pause applied when the provider throttles us without saying for how long.
const DEFAULT_RATE_LIMIT_PAUSE_SECS: u64 = 60;

/// Every rate-limit wait spends at least this much of the wait ceiling.
const MIN_RATE_LIMIT_PAUSE: Duration = Duration::from_secs(1);

/// Longest `Retry-After` honored before treating it as a very long wait.
const MAX_RETRY_AFTER_SECS: u64 = 86_400;

/// Rate limit information reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: Option<u32>,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Settings for [`RateLimitedClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub token: Option<String>,
    pub rate_limit_per_window: u32,
    pub rate_limit_window: Duration,
    pub max_wait: Duration,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl ClientOptions {
    #[must_use]
    pub fn from_config(config: &Config, token: Option<&str>) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            token: token.map(str::to_owned),
            rate_limit_per_window: config.rate_limit_per_window,
            rate_limit_window: Duration::from_secs(config.rate_limit_window_secs),
            max_wait: Duration::from_secs(config.max_wait_secs),
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.backoff_base_ms),
                Duration::from_millis(config.backoff_max_ms),
            ),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

/// What to do with a provider response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Success,
    NotFound,
    RateLimited { reset_at: DateTime<Utc> },
    Transient,
    Fatal,
}

/// Body of `GET /rate_limit`
#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    rate: RateLimitBody,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    limit: u32,
    remaining: u32,
    reset: i64,
}

/// HTTP client shared by every fetch of a run.
///
/// Construct once and share it through an `Arc`.
#[derive(Debug)]
pub struct RateLimitedClient {
    client: reqwest::Client,
    base_url: String,
    bucket: Arc<TokenBucket>,
    retry: RetryPolicy,
    max_wait: Duration,
}

impl RateLimitedClient {
    pub fn new(options: ClientOptions) -> crate::Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));
        let _ = headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));

        if let Some(token) = options.token.as_deref() {
            let mut auth_val = HeaderValue::from_str(&format!("Bearer {token}"))?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        } else {
            log::warn!(target: LOG_TARGET, "No GitHub token provided, requests are limited to the unauthenticated quota");
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(options.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_owned(),
            bucket: Arc::new(TokenBucket::new(options.rate_limit_per_window, options.rate_limit_window)),
            retry: options.retry,
            max_wait: options.max_wait,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }

    /// Issue a GET request for `path` (relative to the API root) and return the successful response.
    ///
    /// Transient failures are retried with jittered exponential backoff. Waiting for
    /// tokens or for a provider reset happens inside a single attempt, and all such
    /// waits share the `max_wait` ceiling.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response, FetchError> {
        let clock = Clock::new_tokio();
        let context = ResilienceContext::new(&clock).name("github_get");

        let attempt = Attempt {
            client: self.client.clone(),
            bucket: Arc::clone(&self.bucket),
            path: Arc::from(path),
            wait_budget: Arc::new(Mutex::new(self.max_wait)),
        };
        let retry_path = Arc::clone(&attempt.path);

        let service = (
            Retry::layer("retry", &context)
                .clone_input()
                .recovery_with(|outcome: &Result<reqwest::Response, FetchError>, _| RetryPolicy::recovery(outcome))
                .max_retry_attempts(self.retry.max_retries())
                .base_delay(self.retry.base_delay())
                .max_delay(self.retry.max_delay())
                .backoff(Backoff::Exponential)
                .use_jitter(true)
                .on_retry(move |_output, args| {
                    log::debug!(
                        target: LOG_TARGET,
                        "Retrying GET {retry_path} (attempt {}, delay {}ms)",
                        args.attempt().index() + 1,
                        args.retry_delay().as_millis()
                    );
                }),
            Execute::new(move |url: String| {
                let attempt = attempt.clone();
                async move { attempt.send(&url).await }
            }),
        )
            .into_service();

        service.execute(format!("{}{path}", self.base_url)).await
    }

    /// Check the token against `/rate_limit` and seed the request budget from the answer.
    pub async fn rate_limit_status(&self) -> Result<RateLimitInfo, FetchError> {
        let path = "/rate_limit";
        let resp = self.get(path).await?;
        let body: RateLimitResponse = resp.json().await.map_err(|e| FetchError::from_decode(&e, path))?;

        let now = Utc::now();
        let reset_at = DateTime::from_timestamp(body.rate.reset, 0).unwrap_or(now);
        self.bucket.observe(body.rate.remaining, until(reset_at, now));

        log::info!(
            target: LOG_TARGET,
            "GitHub quota: {} of {} requests remaining, resets at {reset_at}",
            body.rate.remaining,
            body.rate.limit
        );

        Ok(RateLimitInfo {
            limit: Some(body.rate.limit),
            remaining: body.rate.remaining,
            reset_at,
        })
    }
}

/// One try at a GET request, owning what it needs.
#[derive(Debug, Clone)]
struct Attempt {
    client: reqwest::Client,
    bucket: Arc<TokenBucket>,
    path: Arc<str>,

    // Shared by every attempt of one call
    wait_budget: Arc<Mutex<Duration>>,
}

impl Attempt {
    async fn send(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let path = &*self.path;

        loop {
            let waited = self.bucket.acquire(self.remaining_wait()).await.map_err(|e| FetchError::RateLimitExceeded {
                reset_at: after(Utc::now(), e.available_in),
            })?;
            self.charge(waited);

            log::debug!(target: LOG_TARGET, "GET {path}");

            let resp = self.client.get(url).send().await.map_err(|e| FetchError::from_request(&e, path))?;
            let now = Utc::now();
            let status = resp.status();

            if let Some(info) = extract_rate_limit_from_headers(resp.headers()) {
                self.bucket.observe(info.remaining, until(info.reset_at, now));
            }

            match classify(status, resp.headers(), now) {
                Disposition::Success => return Ok(resp),
                Disposition::NotFound => {
                    return Err(FetchError::NotFound {
                        resource: format!("'{path}'"),
                    });
                }
                Disposition::Fatal => {
                    return Err(FetchError::Fatal {
                        message: format!("GET {path} failed with status {status}"),
                        status: Some(status.as_u16()),
                    });
                }
                Disposition::Transient => {
                    return Err(FetchError::Transient {
                        message: format!("GET {path} failed with status {status}"),
                        status: Some(status.as_u16()),
                    });
                }
                Disposition::RateLimited { reset_at } => {
                    let wait = until(reset_at, now).max(MIN_RATE_LIMIT_PAUSE);
                    if wait > self.remaining_wait() {
                        log::warn!(target: LOG_TARGET, "Rate limit on GET {path} resets at {reset_at}, beyond the wait ceiling");
                        return Err(FetchError::RateLimitExceeded { reset_at });
                    }

                    log::warn!(target: LOG_TARGET, "Hit GitHub rate limit on GET {path}, waiting {}s", wait.as_secs());
                    self.charge(wait);
                    let _ = self.bucket.pause_for(wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    fn remaining_wait(&self) -> Duration {
        *self.wait_budget.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn charge(&self, waited: Duration) {
        let mut budget = self.wait_budget.lock().unwrap_or_else(PoisonError::into_inner);
        *budget = budget.saturating_sub(waited);
    }
}

fn classify(status: StatusCode, headers: &HeaderMap, now: DateTime<Utc>) -> Disposition {
    if status.is_success() {
        return Disposition::Success;
    }

    if status.is_server_error() {
        return Disposition::Transient;
    }

    match status {
        StatusCode::NOT_FOUND => Disposition::NotFound,
        StatusCode::REQUEST_TIMEOUT => Disposition::Transient,
        StatusCode::TOO_MANY_REQUESTS => Disposition::RateLimited {
            reset_at: rate_limit_reset(headers, now).unwrap_or_else(|| add_secs(now, DEFAULT_RATE_LIMIT_PAUSE_SECS)),
        },

        // 403 is only a rate limit when the provider says so
        StatusCode::FORBIDDEN => rate_limit_reset(headers, now).map_or(Disposition::Fatal, |reset_at| Disposition::RateLimited { reset_at }),

        _ => Disposition::Fatal,
    }
}

/// When a throttled request may be retried, if the headers say.
fn rate_limit_reset(headers: &HeaderMap, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(secs) = parse_retry_after(headers) {
        return Some(add_secs(now, secs));
    }

    let info = extract_rate_limit_from_headers(headers)?;
    (info.remaining == 0).then_some(info.reset_at)
}

/// Parse the `Retry-After` header value as seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()
}

/// Extract rate limit information from API response headers
fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.parse::<u32>().ok()?;
    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;
    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;
    let limit = headers
        .get("x-ratelimit-limit")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u32>().ok());

    Some(RateLimitInfo { limit, remaining, reset_at })
}

/// Whether a `Link` header advertises another page.
pub(crate) fn has_next_page(headers: &HeaderMap) -> bool {
    headers
        .get(reqwest::header::LINK)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|link| link.contains(r#"rel="next""#))
}

fn until(instant: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (instant - now).to_std().unwrap_or(Duration::ZERO)
}

fn after(now: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(d)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn add_secs(now: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    now + TimeDelta::seconds(secs.min(MAX_RETRY_AFTER_SECS).cast_signed())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (name, value) in pairs {
            let _ = h.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        h
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_classify_success_and_not_found() {
        assert_eq!(classify(StatusCode::OK, &HeaderMap::new(), now()), Disposition::Success);
        assert_eq!(classify(StatusCode::NOT_FOUND, &HeaderMap::new(), now()), Disposition::NotFound);
    }

    #[test]
    fn test_classify_server_errors_are_transient() {
        for code in [500, 502, 503, 504] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(classify(status, &HeaderMap::new(), now()), Disposition::Transient);
        }
        assert_eq!(classify(StatusCode::REQUEST_TIMEOUT, &HeaderMap::new(), now()), Disposition::Transient);
    }

    #[test]
    fn test_classify_client_errors_are_fatal() {
        for code in [400, 401, 410, 422] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(classify(status, &HeaderMap::new(), now()), Disposition::Fatal);
        }
    }

    #[test]
    fn test_classify_forbidden_without_rate_limit_is_fatal() {
        let h = headers(&[("x-ratelimit-remaining", "42"), ("x-ratelimit-reset", "1700000600")]);
        assert_eq!(classify(StatusCode::FORBIDDEN, &h, now()), Disposition::Fatal);
    }

    #[test]
    fn test_classify_forbidden_with_exhausted_quota() {
        let h = headers(&[("x-ratelimit-remaining", "0"), ("x-ratelimit-reset", "1700000600")]);
        assert_eq!(
            classify(StatusCode::FORBIDDEN, &h, now()),
            Disposition::RateLimited {
                reset_at: DateTime::from_timestamp(1_700_000_600, 0).unwrap()
            }
        );
    }

    #[test]
    fn test_classify_retry_after_takes_precedence() {
        let h = headers(&[
            ("retry-after", "30"),
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset", "1700000600"),
        ]);
        assert_eq!(
            classify(StatusCode::FORBIDDEN, &h, now()),
            Disposition::RateLimited {
                reset_at: now() + TimeDelta::seconds(30)
            }
        );
    }

    #[test]
    fn test_classify_too_many_requests_defaults_pause() {
        assert_eq!(
            classify(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), now()),
            Disposition::RateLimited {
                reset_at: now() + TimeDelta::seconds(60)
            }
        );
    }

    #[test]
    fn test_extract_rate_limit_from_headers() {
        let h = headers(&[
            ("x-ratelimit-limit", "5000"),
            ("x-ratelimit-remaining", "4999"),
            ("x-ratelimit-reset", "1700000600"),
        ]);
        let info = extract_rate_limit_from_headers(&h).unwrap();
        assert_eq!(info.limit, Some(5000));
        assert_eq!(info.remaining, 4999);
        assert_eq!(info.reset_at.timestamp(), 1_700_000_600);
    }

    #[test]
    fn test_extract_rate_limit_missing_or_malformed() {
        assert!(extract_rate_limit_from_headers(&HeaderMap::new()).is_none());
        let h = headers(&[("x-ratelimit-remaining", "lots"), ("x-ratelimit-reset", "1700000600")]);
        assert!(extract_rate_limit_from_headers(&h).is_none());
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(&headers(&[("retry-after", "120")])), Some(120));
        assert_eq!(parse_retry_after(&headers(&[("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT")])), None);
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn test_has_next_page() {
        let h = headers(&[(
            "link",
            r#"<https://api.github.com/user/1/repos?page=2>; rel="next", <https://api.github.com/user/1/repos?page=5>; rel="last""#,
        )]);
        assert!(has_next_page(&h));

        let h = headers(&[("link", r#"<https://api.github.com/user/1/repos?page=1>; rel="prev""#)]);
        assert!(!has_next_page(&h));
        assert!(!has_next_page(&HeaderMap::new()));
    }

    #[test]
    fn test_until_past_instant_is_zero() {
        assert_eq!(until(now() - TimeDelta::seconds(5), now()), Duration::ZERO);
        assert_eq!(until(now() + TimeDelta::seconds(5), now()), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_wait_is_charged_once() {
        let attempt = Attempt {
            client: reqwest::Client::new(),
            bucket: Arc::new(TokenBucket::new(100, Duration::from_secs(100))),
            path: Arc::from("/users/octocat"),
            wait_budget: Arc::new(Mutex::new(Duration::from_secs(3))),
        };

        attempt.charge(Duration::from_secs(1));
        let _ = attempt.bucket.pause_for(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(1)).await;

        let waited = attempt.bucket.acquire(attempt.remaining_wait()).await.unwrap();
        attempt.charge(waited);
        assert_eq!(attempt.remaining_wait(), Duration::from_secs(2));

        attempt.charge(Duration::from_secs(5));
        assert_eq!(attempt.remaining_wait(), Duration::ZERO);
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let options = ClientOptions {
            base_url: "http://localhost:1234/".into(),
            ..ClientOptions::from_config(&Config::default(), Some("token"))
        };
        let client = RateLimitedClient::new(options).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234");
    }
}
