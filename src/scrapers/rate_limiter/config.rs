//! Rate limiter configuration and types.

use std::time::Duration;

/// Configuration for rate limiting behavior.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Spacing between requests to the same domain when not backing off.
    pub base_delay: Duration,
    /// Smallest delay used once a domain starts pushing back.
    pub min_backoff_delay: Duration,
    /// Maximum delay (ceiling for backoff).
    pub max_delay: Duration,
    /// Multiplier for exponential backoff on rate limit.
    pub backoff_multiplier: f64,
    /// Multiplier for recovery on success (< 1.0 to decrease delay).
    pub recovery_multiplier: f64,
    /// Number of consecutive successes before reducing delay.
    pub recovery_threshold: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::ZERO,
            min_backoff_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.5,
            recovery_threshold: 10,
        }
    }
}
