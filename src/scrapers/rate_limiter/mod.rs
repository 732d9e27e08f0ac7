//! Adaptive per-domain rate limiter.
//!
//! Every request reserves a slot for its domain. Slots are spaced by the
//! domain's current delay, which grows on 429/503 and server errors and
//! shrinks back after a run of successes.

mod config;
mod domain_state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

pub use config::RateLimitConfig;
use domain_state::DomainState;

/// Adaptive rate limiter shared by every request of a run.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    domains: Arc<RwLock<HashMap<String, DomainState>>>,
}

impl RateLimiter {
    /// Create a new rate limiter with default config.
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    /// Create a new rate limiter with custom config.
    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            domains: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Extract domain from URL.
    pub fn extract_domain(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_string()))
    }

    /// Wait for the domain's next free slot. Returns the domain, if the URL has one.
    pub async fn acquire(&self, url: &str) -> Option<String> {
        let domain = Self::extract_domain(url)?;

        let start = {
            let mut domains = self.domains.write().await;
            let state = domains
                .entry(domain.clone())
                .or_insert_with(|| DomainState::new(self.config.base_delay));
            state.reserve(Instant::now())
        };

        let now = Instant::now();
        if start > now {
            debug!("Rate limiting {}: waiting {:?}", domain, start - now);
            tokio::time::sleep_until(start).await;
        }

        Some(domain)
    }

    /// Report a successful request - may decrease delay.
    pub async fn report_success(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.consecutive_successes += 1;

            if state.in_backoff && state.consecutive_successes >= self.config.recovery_threshold {
                let reduced = Duration::from_secs_f64(
                    state.current_delay.as_secs_f64() * self.config.recovery_multiplier,
                );

                if reduced <= self.config.base_delay.max(self.config.min_backoff_delay) {
                    state.in_backoff = false;
                    state.current_delay = self.config.base_delay;
                    info!("Domain {} recovered from rate limit backoff", domain);
                } else {
                    state.current_delay = reduced;
                    debug!(
                        "Domain {} delay reduced to {:?}",
                        domain, state.current_delay
                    );
                }

                state.consecutive_successes = 0;
            }
        }
    }

    /// Report a definite rate limit hit (429 or 503) - increases delay.
    pub async fn report_rate_limit(&self, domain: &str, status_code: u16) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.rate_limit_hits += 1;
            state.consecutive_successes = 0;
            state.in_backoff = true;
            state.current_delay = self.backed_off(state.current_delay, self.config.backoff_multiplier);

            warn!(
                "Rate limited by {} (HTTP {}, hit #{}), backing off to {:?}",
                domain, status_code, state.rate_limit_hits, state.current_delay
            );
        }
    }

    /// Report a server error (5xx other than 503) - mild backoff.
    pub async fn report_server_error(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.consecutive_successes = 0;
            state.in_backoff = true;
            state.current_delay = self.backed_off(state.current_delay, 1.5);
            debug!(
                "Server error for {}, delay increased to {:?}",
                domain, state.current_delay
            );
        }
    }

    /// Route a response status to the matching report method.
    pub async fn report_status(&self, domain: &str, status_code: u16) {
        match status_code {
            429 | 503 => self.report_rate_limit(domain, status_code).await,
            500..=599 => self.report_server_error(domain).await,
            200..=399 => self.report_success(domain).await,
            _ => {}
        }
    }

    fn backed_off(&self, current: Duration, multiplier: f64) -> Duration {
        let next = Duration::from_secs_f64(current.as_secs_f64() * multiplier);
        next.max(self.config.min_backoff_delay)
            .min(self.config.max_delay)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
