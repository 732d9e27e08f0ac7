//! Run orchestration: discover every enabled source, plan, then download.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

use crate::catalog::{self, discover};
use crate::config::Settings;
use crate::error::SpiderError;
use crate::models::{FetchTask, SourceKind};
use crate::scrapers::{HttpClient, RateLimiter};
use crate::services::{
    DownloadEvent, DownloadResult, DownloadService, Normalizer, RunContext, ShutdownSignal,
};
use crate::storage::Planner;

/// Discovery statistics for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDiscovery {
    pub source: SourceKind,
    pub entries: usize,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub excluded: usize,
}

/// Everything planned for a run, ready to download.
#[derive(Debug, Default)]
pub struct RunPlan {
    pub tasks: Vec<FetchTask>,
    pub sources: Vec<SourceDiscovery>,
}

impl RunPlan {
    /// Tasks whose output already exists and will be skipped.
    pub fn present(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_present()).count()
    }
}

pub struct Spider {
    settings: Settings,
    ctx: RunContext,
}

impl Spider {
    pub fn new(settings: Settings, ctx: RunContext) -> Self {
        Self { settings, ctx }
    }

    /// Build a spider that talks to the real sites.
    pub fn connect(settings: Settings, shutdown: ShutdownSignal) -> Result<Self, SpiderError> {
        settings.validate()?;
        let fetch = &settings.fetch;
        let client = HttpClient::with_rate_limiter(
            fetch.timeout(),
            fetch.request_delay(),
            RateLimiter::with_config(fetch.rate_limit_config()),
            fetch.user_agent.as_deref(),
        )?;
        let ctx = RunContext::new(Arc::new(client), fetch.retry_policy(), fetch.concurrency)
            .with_discovery_concurrency(fetch.discovery_concurrency())
            .with_shutdown(shutdown);
        Ok(Self::new(settings, ctx))
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Discover every enabled source and assign destinations.
    pub async fn plan(&self) -> Result<RunPlan, SpiderError> {
        let mut plan = RunPlan::default();
        let mut planner = Planner::new();

        for source in self.settings.enabled_sources() {
            let site = catalog::site_for(source.source);
            let filter = source.entry_filter()?;
            let report = discover(
                site.as_ref(),
                source.categories.as_deref(),
                &filter,
                &self.ctx,
            )
            .await?;

            plan.sources.push(SourceDiscovery {
                source: source.source,
                entries: report.entries.len(),
                pages_fetched: report.pages_fetched,
                pages_failed: report.pages_failed,
                excluded: report.excluded,
            });

            let tasks = planner.plan(report.entries, &source.output_dir, &source.naming_rules());
            info!(
                "Planned {} {} task(s) under {}",
                tasks.len(),
                source.source,
                source.output_dir.display()
            );
            plan.tasks.extend(tasks);
        }

        Ok(plan)
    }

    /// Download a planned run.
    pub async fn download(
        &self,
        plan: RunPlan,
        event_tx: mpsc::Sender<DownloadEvent>,
    ) -> Result<DownloadResult, SpiderError> {
        let mut normalizer = Normalizer::new();
        for source in SourceKind::ALL {
            normalizer = normalizer.with_magic(source, self.settings.source(source).magic_prefixes()?);
        }

        let service = DownloadService::new(self.ctx.clone(), normalizer);
        Ok(service.download(plan.tasks, event_tx).await)
    }

    /// Plan and download in one go.
    pub async fn run(
        &self,
        event_tx: mpsc::Sender<DownloadEvent>,
    ) -> Result<DownloadResult, SpiderError> {
        let plan = self.plan().await?;
        self.download(plan, event_tx).await
    }
}
