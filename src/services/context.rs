//! State shared by every task of a single run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::shutdown::ShutdownSignal;
use crate::scrapers::{Fetcher, RetryPolicy};

/// Live counters for a run, readable while workers are busy.
#[derive(Debug, Default)]
pub struct RunCounters {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    requests: AtomicUsize,
}

impl RunCounters {
    /// Mark a request as started. The returned guard ends it on drop.
    pub fn start_request(&self) -> InFlightGuard<'_> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard { counters: self }
    }

    /// Highest number of simultaneous requests observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

pub struct InFlightGuard<'a> {
    counters: &'a RunCounters,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Everything a run needs besides its inputs. Passed explicitly, never global.
#[derive(Clone)]
pub struct RunContext {
    pub fetcher: Arc<dyn Fetcher>,
    pub retry: RetryPolicy,
    /// Maximum concurrent dictionary downloads.
    pub concurrency: usize,
    /// Maximum concurrent catalog page fetches.
    pub discovery_concurrency: usize,
    pub shutdown: ShutdownSignal,
    pub counters: Arc<RunCounters>,
}

impl RunContext {
    pub fn new(fetcher: Arc<dyn Fetcher>, retry: RetryPolicy, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            fetcher,
            retry,
            concurrency,
            discovery_concurrency: concurrency,
            shutdown: ShutdownSignal::never(),
            counters: Arc::new(RunCounters::default()),
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_discovery_concurrency(mut self, n: usize) -> Self {
        self.discovery_concurrency = n.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_tracks_peak() {
        let counters = RunCounters::default();
        {
            let _a = counters.start_request();
            let _b = counters.start_request();
            assert_eq!(counters.peak_in_flight(), 2);
        }
        let _c = counters.start_request();
        let _d = counters.start_request();
        assert_eq!(counters.peak_in_flight(), 2);
        let _e = counters.start_request();
        assert_eq!(counters.peak_in_flight(), 3);
        assert_eq!(counters.requests(), 5);
    }
}
