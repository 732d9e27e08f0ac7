//! HTTP client used for catalog pages and dictionary downloads.

mod user_agent;

pub use user_agent::{resolve_user_agent, USER_AGENT};

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use tracing::debug;

use super::rate_limiter::RateLimiter;
use super::{FetchError, Fetcher};
use crate::error::SpiderError;

/// HTTP client with per-domain adaptive rate limiting.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_delay: Duration,
    rate_limiter: RateLimiter,
}

impl HttpClient {
    /// Create a new HTTP client with a shared rate limiter and optional custom user agent.
    pub fn with_rate_limiter(
        timeout: Duration,
        request_delay: Duration,
        rate_limiter: RateLimiter,
        user_agent_config: Option<&str>,
    ) -> Result<Self, SpiderError> {
        let user_agent = resolve_user_agent(user_agent_config);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(user_agent::ACCEPT));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(user_agent::ACCEPT_LANGUAGE),
        );

        let client = Client::builder()
            .user_agent(&user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            request_delay,
            rate_limiter,
        })
    }

    /// GET `url` and return its body. Non-2xx statuses and empty bodies are errors.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let domain = self.rate_limiter.acquire(url).await;

        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;
        let status = response.status();

        debug!(
            "GET {} -> {} in {:?}",
            url,
            status.as_u16(),
            start.elapsed()
        );

        if let Some(ref domain) = domain {
            self.rate_limiter.report_status(domain, status.as_u16()).await;
        }

        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(FetchError::from_reqwest)?;

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        if body.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        Ok(body.to_vec())
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.get_bytes(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_with_custom_agent() {
        let client = HttpClient::with_rate_limiter(
            Duration::from_secs(5),
            Duration::ZERO,
            RateLimiter::new(),
            Some("dict-spider-test/1.0"),
        );
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url_is_permanent() {
        let client = HttpClient::with_rate_limiter(
            Duration::from_secs(5),
            Duration::ZERO,
            RateLimiter::new(),
            None,
        )
        .unwrap();
        let err = client.get_bytes("not a url").await.unwrap_err();
        assert!(!err.is_transient(), "unexpected transient error: {err:?}");
    }
}
