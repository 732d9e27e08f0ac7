//! CLI entry point and flag handling.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use console::style;
use tokio::sync::mpsc;
use tracing::warn;

use dict_spider::config::{Config, Settings};
use dict_spider::error::SpiderError;
use dict_spider::services::{DownloadEvent, Shutdown};
use dict_spider::spider::Spider;

use super::helpers::{print_discovery, print_plan, print_summary};
use super::progress::{discovery_spinner, DownloadProgress};

/// Exit status after Ctrl-C, as a shell would report SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "dict-spider")]
#[command(about = "A Sougou & Baidu pinyin dictionary spider")]
#[command(version)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output debug info
    #[arg(long)]
    pub debug: bool,

    /// Number of parallel downloads [default: 16]
    #[arg(short = 'j', long, env = "DICT_SPIDER_CONCURRENCY", value_name = "N")]
    pub concurrent_downloads: Option<usize>,

    /// Retries after the first attempt [default: 2]
    #[arg(short = 'm', long, env = "DICT_SPIDER_MAX_RETRIES", value_name = "N")]
    pub max_retries: Option<u32>,

    /// Per-request timeout in seconds [default: 60]
    #[arg(short = 't', long, env = "DICT_SPIDER_TIMEOUT", value_name = "SEC")]
    pub timeout: Option<u64>,

    /// Skip Sougou dictionaries
    #[arg(long)]
    pub no_sougou: bool,

    /// Skip Baidu dictionaries
    #[arg(long)]
    pub no_baidu: bool,

    /// Directory to save Sougou dictionaries [default: sougou_dict]
    #[arg(short = 'd', long, value_name = "DIR")]
    pub sougou_directory: Option<PathBuf>,

    /// Directory to save Baidu dictionaries [default: baidu_dict]
    #[arg(short = 'D', long, value_name = "DIR")]
    pub baidu_directory: Option<PathBuf>,

    /// Sougou category ids to download. Category 0 holds dictionaries without
    /// a category. All categories by default.
    #[arg(short = 'c', long, num_args = 1.., value_delimiter = ',', value_name = "CATEGORY")]
    pub sougou_categories: Option<Vec<String>>,

    /// Baidu category ids to download. All categories by default.
    #[arg(short = 'C', long, num_args = 1.., value_delimiter = ',', value_name = "CATEGORY")]
    pub baidu_categories: Option<Vec<String>>,

    /// Sougou dictionary ids to exclude [default: 2775 15946 15233]
    #[arg(short = 'e', long, num_args = 1.., value_delimiter = ',', value_name = "DICTIONARY")]
    pub sougou_exclude: Option<Vec<String>>,

    /// Baidu dictionary inner ids to exclude [default: 4206105738]
    #[arg(short = 'E', long, num_args = 1.., value_delimiter = ',', value_name = "DICTIONARY")]
    pub baidu_exclude: Option<Vec<String>>,

    /// Configuration file (TOML, or JSON with a `.json` extension)
    #[arg(long, env = "DICT_SPIDER_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Exit with status 1 when any dictionary failed
    #[arg(long)]
    pub strict: bool,

    /// Discover and plan, but download nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Show download progress
    #[arg(short = 'P', long)]
    pub progress: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Default tracing filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "dict_spider=debug"
        } else if self.verbose {
            "dict_spider=info"
        } else {
            "dict_spider=warn"
        }
    }

    /// Apply flags on top of file configuration.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(n) = self.concurrent_downloads {
            settings.fetch.concurrency = n;
        }
        if let Some(n) = self.max_retries {
            settings.fetch.max_retries = n;
        }
        if let Some(secs) = self.timeout {
            settings.fetch.timeout_secs = secs;
        }
        if self.no_sougou {
            settings.sougou.enabled = false;
        }
        if self.no_baidu {
            settings.baidu.enabled = false;
        }
        if let Some(ref dir) = self.sougou_directory {
            settings.sougou.output_dir = dir.clone();
        }
        if let Some(ref dir) = self.baidu_directory {
            settings.baidu.output_dir = dir.clone();
        }
        if let Some(ref categories) = self.sougou_categories {
            settings.sougou.categories = Some(categories.clone());
        }
        if let Some(ref categories) = self.baidu_categories {
            settings.baidu.categories = Some(categories.clone());
        }
        if let Some(ref ids) = self.sougou_exclude {
            settings.sougou.exclude_ids = ids.clone();
        }
        if let Some(ref ids) = self.baidu_exclude {
            settings.baidu.exclude_ids = ids.clone();
        }
    }
}

/// Run the spider with parsed arguments.
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::load(cli.config.as_deref())
        .await
        .context("failed to load configuration")?;
    let mut settings = config.to_settings();
    cli.apply_to_settings(&mut settings);

    let shutdown = Shutdown::new();
    let spider = Spider::connect(settings, shutdown.signal()).context("failed to set up spider")?;

    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping workers");
            shutdown.trigger();
        }
    });

    let exit = crawl(&cli, &spider).await;
    ctrl_c.abort();
    exit
}

async fn crawl(cli: &Cli, spider: &Spider) -> anyhow::Result<ExitCode> {
    let spinner = cli
        .progress
        .then(|| discovery_spinner("Discovering dictionaries..."));
    let planned = spider.plan().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let plan = match planned {
        Ok(plan) => plan,
        Err(SpiderError::Interrupted) => {
            eprintln!("{} Interrupted during discovery", style("!").yellow());
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
        Err(e) => return Err(e).context("catalog discovery failed"),
    };

    if cli.dry_run {
        print_plan(&plan, cli.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    if !cli.json {
        print_discovery(&plan.sources);
    }

    let workers = spider.context().concurrency.min(plan.tasks.len());
    let progress_display = cli
        .progress
        .then(|| Arc::new(DownloadProgress::new(workers, plan.tasks.len())));

    // Event channel for progress updates
    let (event_tx, mut event_rx) = mpsc::channel::<DownloadEvent>(100);

    let progress_clone = progress_display.clone();
    let event_handler = tokio::spawn(async move {
        let (mut downloaded, mut skipped, mut failed) = (0usize, 0usize, 0usize);

        while let Some(event) = event_rx.recv().await {
            let worker_id = match event {
                DownloadEvent::Started { worker_id, label } => {
                    if let Some(ref progress) = progress_clone {
                        progress.start_download(worker_id, &label);
                    }
                    continue;
                }
                DownloadEvent::Completed { worker_id, .. } => {
                    downloaded += 1;
                    worker_id
                }
                DownloadEvent::Skipped { worker_id, .. } => {
                    skipped += 1;
                    worker_id
                }
                DownloadEvent::Failed { worker_id, .. } => {
                    failed += 1;
                    worker_id
                }
            };
            if let Some(ref progress) = progress_clone {
                progress.set_summary(downloaded, skipped, failed);
                progress.finish_download(worker_id);
            }
        }
    });

    let result = spider
        .download(plan, event_tx)
        .await
        .context("download failed")?;

    let _ = event_handler.await;
    if let Some(ref progress) = progress_display {
        progress.finish();
    }

    let summary = result.summary;
    print_summary(&summary, cli.json)?;

    if summary.interrupted {
        Ok(ExitCode::from(EXIT_INTERRUPTED))
    } else if cli.strict && summary.failed > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::try_parse_from([
            "dict-spider",
            "-j",
            "4",
            "--no-baidu",
            "-c",
            "1",
            "167",
            "-e",
            "9,10",
            "-d",
            "/tmp/sg",
        ])
        .unwrap();
        let mut settings = Settings::default();
        cli.apply_to_settings(&mut settings);

        assert_eq!(settings.fetch.concurrency, 4);
        assert!(!settings.baidu.enabled);
        assert_eq!(
            settings.sougou.categories,
            Some(vec!["1".to_string(), "167".to_string()])
        );
        assert_eq!(settings.sougou.exclude_ids, vec!["9".to_string(), "10".to_string()]);
        assert_eq!(settings.sougou.output_dir, PathBuf::from("/tmp/sg"));
    }

    #[test]
    fn test_log_filter_levels() {
        let cli = Cli::try_parse_from(["dict-spider", "--debug", "-v"]).unwrap();
        assert_eq!(cli.log_filter(), "dict_spider=debug");
        let cli = Cli::try_parse_from(["dict-spider"]).unwrap();
        assert_eq!(cli.log_filter(), "dict_spider=warn");
    }
}
