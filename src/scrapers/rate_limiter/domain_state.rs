//! Per-domain rate limiting state.

use std::time::Duration;

use tokio::time::Instant;

/// State for a single domain.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Current spacing between requests.
    pub current_delay: Duration,
    /// Earliest instant the next request may start.
    pub next_slot: Option<Instant>,
    /// Consecutive successes since last rate limit.
    pub consecutive_successes: u32,
    /// Whether currently in backoff.
    pub in_backoff: bool,
    /// Total rate limit hits.
    pub rate_limit_hits: u64,
}

impl DomainState {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            current_delay: base_delay,
            next_slot: None,
            consecutive_successes: 0,
            in_backoff: false,
            rate_limit_hits: 0,
        }
    }

    /// Reserve the next request slot and return when it starts.
    ///
    /// Concurrent callers get consecutive slots spaced `current_delay` apart.
    pub fn reserve(&mut self, now: Instant) -> Instant {
        let start = match self.next_slot {
            Some(slot) if slot > now => slot,
            _ => now,
        };
        self.next_slot = Some(start + self.current_delay);
        start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_spaces_requests() {
        let mut state = DomainState::new(Duration::from_millis(100));
        let now = Instant::now();
        let first = state.reserve(now);
        let second = state.reserve(now);
        let third = state.reserve(now);
        assert_eq!(first, now);
        assert_eq!(second - first, Duration::from_millis(100));
        assert_eq!(third - second, Duration::from_millis(100));
        assert_eq!(state.next_slot, Some(now + Duration::from_millis(300)));
    }

    #[test]
    fn test_zero_delay_never_waits() {
        let mut state = DomainState::new(Duration::ZERO);
        let now = Instant::now();
        assert_eq!(state.reserve(now), now);
        assert_eq!(state.reserve(now), now);
    }
}
