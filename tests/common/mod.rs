//! Shared helpers for integration tests: an in-memory fetcher and the
//! catalog fixtures it serves.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dict_spider::scrapers::{FetchError, Fetcher, RetryPolicy};
use dict_spider::services::RunContext;

/// Serves canned responses and records what was asked of it.
#[derive(Default)]
pub struct StubFetcher {
    responses: Mutex<HashMap<String, VecDeque<Result<Vec<u8>, FetchError>>>>,
    attempts: Mutex<HashMap<String, u32>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every response for `delay` so requests overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Always answer `url` with `body`.
    pub fn body(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.script(url, vec![Ok(body.into())])
    }

    /// Answer `url` with each response in turn; the last one repeats.
    pub fn script(self, url: &str, responses: Vec<Result<Vec<u8>, FetchError>>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into());
        self
    }

    pub fn attempts(&self, url: &str) -> u32 {
        self.attempts.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> u32 {
        self.attempts.lock().unwrap().values().sum()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        *self.attempts.lock().unwrap().entry(url.to_string()).or_default() += 1;

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(Err(FetchError::Status(404))),
            None => Err(FetchError::Status(404)),
        }
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let response = self.respond(url);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

/// Retry policy with millisecond delays.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        backoff_multiplier: 2.0,
        max_delay: Duration::from_millis(5),
    }
}

pub fn context(fetcher: Arc<StubFetcher>, concurrency: usize, max_attempts: u32) -> RunContext {
    RunContext::new(fetcher, fast_retry(max_attempts), concurrency)
}

pub const BAIDU_INDEX: &str = "https://shurufa.baidu.com/dict";

pub fn baidu_download(id: &str) -> String {
    format!("https://shurufa.baidu.com/dict_innerid_download?innerid={}", id)
}

/// Baidu catalog with two categories and three distinct dictionaries.
pub fn baidu_catalog(fetcher: StubFetcher) -> StubFetcher {
    fetcher
        .body(BAIDU_INDEX, include_str!("../fixtures/baidu_index.html"))
        .body(
            "https://shurufa.baidu.com/dict_list?cid=157",
            include_str!("../fixtures/baidu_category_157.html"),
        )
        .body(
            "https://shurufa.baidu.com/dict_list?cid=157&page=1",
            include_str!("../fixtures/baidu_listing_157_1.html"),
        )
        .body(
            "https://shurufa.baidu.com/dict_list?cid=157&page=2",
            include_str!("../fixtures/baidu_listing_157_2.html"),
        )
        .body(
            "https://shurufa.baidu.com/dict_list?cid=317",
            include_str!("../fixtures/baidu_category_317.html"),
        )
        .body(
            "https://shurufa.baidu.com/dict_list?cid=317&page=1",
            include_str!("../fixtures/baidu_listing_317_1.html"),
        )
}

pub const SOUGOU_INDEX: &str = "https://pinyin.sogou.com/dict/";

/// Sougou catalog covering regular, city and uncategorized dictionaries.
pub fn sougou_catalog(fetcher: StubFetcher) -> StubFetcher {
    fetcher
        .body(SOUGOU_INDEX, include_str!("../fixtures/sougou_index.html"))
        .body(
            "https://pinyin.sogou.com/dict/detail/index/4",
            include_str!("../fixtures/sougou_recommended.html"),
        )
        .body(
            "https://pinyin.sogou.com/dict/cate/index/1",
            include_str!("../fixtures/sougou_category_1.html"),
        )
        .body(
            "https://pinyin.sogou.com/dict/cate/index/1/default/1",
            include_str!("../fixtures/sougou_listing_1_1.html"),
        )
        .body(
            "https://pinyin.sogou.com/dict/cate/index/1/default/2",
            include_str!("../fixtures/sougou_listing_1_2.html"),
        )
        .body(
            "https://pinyin.sogou.com/dict/cate/index/180",
            include_str!("../fixtures/sougou_city_index.html"),
        )
        .body(
            "https://pinyin.sogou.com/dict/cate/index/360",
            include_str!("../fixtures/sougou_category_360.html"),
        )
        .body(
            "https://pinyin.sogou.com/dict/cate/index/360/default/1",
            include_str!("../fixtures/sougou_listing_360_1.html"),
        )
}

/// Bytes that look like a Baidu `.bdict` file.
pub fn bdict_bytes(tag: &str) -> Vec<u8> {
    let mut bytes = b"biptbdsw".to_vec();
    bytes.extend_from_slice(tag.as_bytes());
    bytes
}

/// Bytes that look like a Sougou `.scel` file.
pub fn scel_bytes(tag: &str) -> Vec<u8> {
    let mut bytes = vec![0x40, 0x15, 0x00, 0x00, 0x44, 0x43, 0x53, 0x01];
    bytes.extend_from_slice(tag.as_bytes());
    bytes
}
