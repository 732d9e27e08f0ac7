//! Configuration management.
//!
//! A TOML file provides overrides on top of built-in defaults, and CLI flags
//! override both. The file is `--config` when given, otherwise whatever
//! `prefer` discovers for `dict-spider` in its standard locations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::EntryFilter;
use crate::error::SpiderError;
use crate::models::SourceKind;
use crate::scrapers::{RateLimitConfig, RetryPolicy};
use crate::services::normalize::parse_magic;
use crate::storage::{CategoryLayout, NamingRules};

/// Name `prefer` discovers config files under (`dict-spider.toml`, ...).
pub const CONFIG_NAME: &str = "dict-spider";

/// Header of a Sougou `.scel` file.
pub const SCEL_MAGIC: &str = "4015000044435301";

/// Header of a Baidu `.bdict` file (`biptbdsw`).
pub const BDICT_MAGIC: &str = "6269707462647377";

/// Network settings shared by both sources.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    /// Concurrent dictionary downloads.
    pub concurrency: usize,
    /// Concurrent catalog page fetches. Defaults to `concurrency`.
    pub discovery_concurrency: Option<usize>,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub timeout_secs: u64,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
    /// Fixed pause after each request.
    pub request_delay_ms: u64,
    pub user_agent: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            concurrency: 16,
            discovery_concurrency: None,
            max_retries: 2,
            timeout_secs: 60,
            base_delay_ms: 500,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
            request_delay_ms: 0,
            user_agent: None,
        }
    }
}

impl FetchSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.saturating_add(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            ..RateLimitConfig::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn discovery_concurrency(&self) -> usize {
        self.discovery_concurrency.unwrap_or(self.concurrency).max(1)
    }
}

/// Resolved settings for one catalog source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub source: SourceKind,
    pub enabled: bool,
    pub output_dir: PathBuf,
    /// Top-level category ids to crawl. `None` crawls the whole catalog.
    pub categories: Option<Vec<String>>,
    pub exclude_ids: Vec<String>,
    /// Regexes matched against entry names.
    pub exclude_name_patterns: Vec<String>,
    /// Characters replaced in file and directory names.
    pub unsafe_chars: String,
    pub replacement: String,
    pub layout: CategoryLayout,
    /// Hex prefixes a raw dictionary must start with. Empty disables the check.
    pub magic: Vec<String>,
}

impl SourceSettings {
    pub fn defaults(source: SourceKind) -> Self {
        let naming = NamingRules::for_source(source);
        let (output_dir, exclude_ids, magic): (&str, &[&str], &str) = match source {
            SourceKind::Sougou => ("sougou_dict", &["2775", "15946", "15233"], SCEL_MAGIC),
            SourceKind::Baidu => ("baidu_dict", &["4206105738"], BDICT_MAGIC),
        };
        Self {
            source,
            enabled: true,
            output_dir: PathBuf::from(output_dir),
            categories: None,
            exclude_ids: exclude_ids.iter().map(|s| s.to_string()).collect(),
            exclude_name_patterns: Vec::new(),
            unsafe_chars: naming.unsafe_chars.iter().collect(),
            replacement: naming.replacement,
            layout: naming.layout,
            magic: vec![magic.to_string()],
        }
    }

    pub fn naming_rules(&self) -> NamingRules {
        NamingRules {
            unsafe_chars: self.unsafe_chars.chars().collect(),
            replacement: self.replacement.clone(),
            layout: self.layout,
        }
    }

    pub fn entry_filter(&self) -> Result<EntryFilter, SpiderError> {
        let patterns = self
            .exclude_name_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    SpiderError::Config(format!("{}: bad exclude pattern {:?}: {}", self.source, p, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EntryFilter::new(self.exclude_ids.iter().cloned(), patterns))
    }

    pub fn magic_prefixes(&self) -> Result<Vec<Vec<u8>>, SpiderError> {
        parse_magic(&self.magic)
            .map_err(|e| SpiderError::Config(format!("{}: bad magic prefix: {}", self.source, e)))
    }
}

/// Fully resolved settings for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub fetch: FetchSettings,
    pub sougou: SourceSettings,
    pub baidu: SourceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            sougou: SourceSettings::defaults(SourceKind::Sougou),
            baidu: SourceSettings::defaults(SourceKind::Baidu),
        }
    }
}

impl Settings {
    pub fn source(&self, source: SourceKind) -> &SourceSettings {
        match source {
            SourceKind::Sougou => &self.sougou,
            SourceKind::Baidu => &self.baidu,
        }
    }

    /// Enabled sources in a fixed order.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceSettings> {
        [&self.sougou, &self.baidu].into_iter().filter(|s| s.enabled)
    }

    /// Reject settings that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), SpiderError> {
        if self.fetch.concurrency == 0 {
            return Err(SpiderError::Config("concurrency must be at least 1".into()));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(SpiderError::Config("timeout must be at least 1 second".into()));
        }
        if !self.fetch.backoff_multiplier.is_finite() || self.fetch.backoff_multiplier < 1.0 {
            return Err(SpiderError::Config(
                "backoff_multiplier must be a finite number >= 1.0".into(),
            ));
        }
        for source in [&self.sougou, &self.baidu] {
            source.entry_filter()?;
            source.magic_prefixes()?;
            if source.output_dir.as_os_str().is_empty() {
                return Err(SpiderError::Config(format!(
                    "{}: output_dir must not be empty",
                    source.source
                )));
            }
            // A dot replacement would turn `..` back into itself.
            if source
                .replacement
                .chars()
                .any(|c| source.unsafe_chars.contains(c) || matches!(c, '/' | '\\' | '\0' | '.'))
            {
                return Err(SpiderError::Config(format!(
                    "{}: replacement {:?} contains an unsafe character",
                    source.source, source.replacement
                )));
            }
        }
        Ok(())
    }
}

/// `[fetch]` section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl FetchOverrides {
    pub fn apply_to(&self, fetch: &mut FetchSettings) {
        if let Some(n) = self.concurrency {
            fetch.concurrency = n;
        }
        if let Some(n) = self.discovery_concurrency {
            fetch.discovery_concurrency = Some(n);
        }
        if let Some(n) = self.max_retries {
            fetch.max_retries = n;
        }
        if let Some(secs) = self.timeout_secs {
            fetch.timeout_secs = secs;
        }
        if let Some(ms) = self.base_delay_ms {
            fetch.base_delay_ms = ms;
        }
        if let Some(m) = self.backoff_multiplier {
            fetch.backoff_multiplier = m;
        }
        if let Some(ms) = self.max_delay_ms {
            fetch.max_delay_ms = ms;
        }
        if let Some(ms) = self.request_delay_ms {
            fetch.request_delay_ms = ms;
        }
        if let Some(ref ua) = self.user_agent {
            fetch.user_agent = Some(ua.clone());
        }
    }
}

/// `[sources.<name>]` section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_name_patterns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsafe_chars: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<CategoryLayout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magic: Option<Vec<String>>,
}

impl SourceOverrides {
    /// Apply these overrides. Relative `output_dir` values resolve against `base_dir`.
    pub fn apply_to(&self, source: &mut SourceSettings, base_dir: &Path) {
        if let Some(enabled) = self.enabled {
            source.enabled = enabled;
        }
        if let Some(ref dir) = self.output_dir {
            source.output_dir = resolve_path(dir, base_dir);
        }
        if let Some(ref categories) = self.categories {
            source.categories = Some(categories.clone());
        }
        if let Some(ref ids) = self.exclude_ids {
            source.exclude_ids = ids.clone();
        }
        if let Some(ref patterns) = self.exclude_name_patterns {
            source.exclude_name_patterns = patterns.clone();
        }
        if let Some(ref chars) = self.unsafe_chars {
            source.unsafe_chars = chars.clone();
        }
        if let Some(ref replacement) = self.replacement {
            source.replacement = replacement.clone();
        }
        if let Some(layout) = self.layout {
            source.layout = layout;
        }
        if let Some(ref magic) = self.magic {
            source.magic = magic.clone();
        }
    }
}

/// `[sources]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    #[serde(default)]
    pub sougou: SourceOverrides,
    #[serde(default)]
    pub baidu: SourceOverrides,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchOverrides,
    #[serde(default)]
    pub sources: SourcesConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Find and load the config file.
    ///
    /// An explicitly requested file must exist. Otherwise `prefer` looks for
    /// a `dict-spider` config in its standard locations, and a run without
    /// one uses the defaults.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, SpiderError> {
        if let Some(path) = explicit {
            return Self::load_from_path(path).await;
        }

        match prefer::load(CONFIG_NAME).await {
            Ok(discovered) => match discovered.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default()),
            },
            Err(e) => {
                debug!("No config file found ({}), using defaults", e);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file path.
    /// TOML by default, JSON for `.json` files.
    pub async fn load_from_path(path: &Path) -> Result<Self, SpiderError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SpiderError::io(path, e))?;

        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents).map_err(|e| e.to_string()),
            _ => Self::parse(&contents).map_err(|e| e.to_string()),
        };
        let mut config: Self =
            parsed.map_err(|e| SpiderError::Config(format!("{}: {}", path.display(), e)))?;

        config.source_path = Some(path.to_path_buf());
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Directory relative paths in the file resolve against.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        let base_dir = self.base_dir();
        self.fetch.apply_to(&mut settings.fetch);
        self.sources.sougou.apply_to(&mut settings.sougou, &base_dir);
        self.sources.baidu.apply_to(&mut settings.baidu, &base_dir);
    }

    /// Defaults with this file applied.
    pub fn to_settings(&self) -> Settings {
        let mut settings = Settings::default();
        self.apply_to_settings(&mut settings);
        settings
    }
}

/// Absolute paths are kept, relative ones are joined onto `base_dir`.
fn resolve_path(path: &str, base_dir: &Path) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
