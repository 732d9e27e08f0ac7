//! dict-spider - Sougou & Baidu pinyin dictionary spider.
//!
//! Crawls the public dictionary catalogs of the Sougou and Baidu input
//! methods, downloads every `.scel` / `.bdict` file with bounded concurrency
//! and lays them out as `<output>/<category>/<name>_<id>.<ext>` for the
//! Fcitx5 and RIME conversion pipeline.

pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod spider;
pub mod storage;
pub mod utils;

pub use error::SpiderError;
pub use spider::{RunPlan, Spider};
