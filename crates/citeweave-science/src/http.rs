use std::cell::Cell;
use std::thread::sleep;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::error::{Result, ScienceError};

/// Header carrying the caller's remaining request allowance.
pub const RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";

/// A successful body plus what the server said about the remaining quota.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub body: String,
    pub quota_remaining: Option<u32>,
}

// ─── RateLimitedClient ────────────────────────────────────────────────────────

/// Blocking HTTP client that spaces requests `min_interval` apart and
/// retries transport failures with exponential backoff.
pub struct RateLimitedClient {
    client: Client,
    min_interval: Duration,
    last_request: Cell<Option<Instant>>,
    max_retries: u32,
    max_retry_wait: Duration,
}

impl RateLimitedClient {
    pub fn new(min_interval: Duration, max_retries: u32, user_agent: &str) -> Result<Self> {
        Self::with_headers(min_interval, max_retries, user_agent, HeaderMap::new())
    }

    pub fn with_headers(
        min_interval: Duration,
        max_retries: u32,
        user_agent: &str,
        default_headers: HeaderMap,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(default_headers)
            .gzip(true)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            min_interval,
            last_request: Cell::new(None),
            max_retries,
            max_retry_wait: Duration::from_secs(120),
        })
    }

    fn wait_for_rate_limit(&self) {
        if let Some(t) = self.last_request.get() {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed);
            }
        }
        self.last_request.set(Some(Instant::now()));
    }

    pub fn get(&self, url: &str) -> Result<HttpResponse> {
        self.get_with_headers(url, HeaderMap::new())
    }

    pub fn get_with_headers(&self, url: &str, headers: HeaderMap) -> Result<HttpResponse> {
        let mut attempt = 0u32;
        loop {
            self.wait_for_rate_limit();
            match self.client.get(url).headers(headers.clone()).send() {
                Ok(r) if r.status().as_u16() == 429 => {
                    let wait = r
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    if attempt >= self.max_retries
                        || Duration::from_secs(wait) > self.max_retry_wait
                    {
                        return Err(ScienceError::RateLimit(url.to_string(), wait));
                    }
                    tracing::warn!(url, wait, "rate limited, backing off");
                    sleep(Duration::from_secs(wait));
                    attempt += 1;
                }
                Ok(r) if r.status().as_u16() == 404 => {
                    return Err(ScienceError::IdentifierNotFound(url.to_string()));
                }
                Ok(r) if !r.status().is_success() => {
                    let status = r.status().as_u16();
                    let body = r.text().unwrap_or_default();
                    return Err(ScienceError::ApiError(
                        url.to_string(),
                        format!("HTTP {status}: {body}"),
                    ));
                }
                Ok(r) => {
                    let quota_remaining = r
                        .headers()
                        .get(RATE_LIMIT_REMAINING)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.trim().parse::<u32>().ok());
                    let body = r.text()?;
                    return Ok(HttpResponse {
                        url: url.to_string(),
                        body,
                        quota_remaining,
                    });
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(ScienceError::Http(e));
                    }
                    let backoff = 2u64.pow(attempt);
                    tracing::debug!(url, attempt, "request failed, retrying in {backoff}s: {e}");
                    sleep(Duration::from_secs(backoff));
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn client() -> RateLimitedClient {
        RateLimitedClient::new(Duration::from_millis(0), 0, "citeweave-test").unwrap()
    }

    #[test]
    fn reads_quota_header() {
        let mut server = Server::new();
        let _m = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_header("X-RateLimit-Remaining", "4187")
            .with_body("{}")
            .create();

        let resp = client().get(&format!("{}/ok", server.url())).unwrap();
        assert_eq!(resp.body, "{}");
        assert_eq!(resp.quota_remaining, Some(4187));
    }

    #[test]
    fn missing_quota_header_is_none() {
        let mut server = Server::new();
        let _m = server.mock("GET", "/ok").with_status(200).with_body("x").create();

        let resp = client().get(&format!("{}/ok", server.url())).unwrap();
        assert_eq!(resp.quota_remaining, None);
    }

    #[test]
    fn too_many_requests_is_rate_limit() {
        let mut server = Server::new();
        let _m = server
            .mock("GET", "/limited")
            .with_status(429)
            .with_header("Retry-After", "3600")
            .create();

        let err = client().get(&format!("{}/limited", server.url())).unwrap_err();
        assert!(matches!(err, ScienceError::RateLimit(_, 3600)));
    }

    #[test]
    fn not_found_is_distinct() {
        let mut server = Server::new();
        let _m = server.mock("GET", "/gone").with_status(404).create();

        let err = client().get(&format!("{}/gone", server.url())).unwrap_err();
        assert!(matches!(err, ScienceError::IdentifierNotFound(_)));
    }

    #[test]
    fn server_error_is_api_error() {
        let mut server = Server::new();
        let _m = server.mock("GET", "/boom").with_status(500).with_body("down").create();

        let err = client().get(&format!("{}/boom", server.url())).unwrap_err();
        match err {
            ScienceError::ApiError(_, msg) => assert!(msg.contains("500")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
