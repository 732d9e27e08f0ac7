//! Breadth-first catalog discovery.
//!
//! Pages are crawled level by level. Within a level, fetches run
//! concurrently but results are consumed in the order the links were found,
//! so the same catalog always yields the same entry order.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use regex::Regex;
use tracing::{debug, info, warn};

use super::extract::normalize_url;
use super::{CatalogSite, ExtractedLink, PageKind, PageRef};
use crate::error::SpiderError;
use crate::models::CatalogEntry;
use crate::scrapers::Attempted;
use crate::services::RunContext;

/// Drops entries the corpus should not contain.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    exclude_ids: HashSet<String>,
    exclude_name_patterns: Vec<Regex>,
}

impl EntryFilter {
    pub fn new(exclude_ids: impl IntoIterator<Item = String>, exclude_name_patterns: Vec<Regex>) -> Self {
        Self {
            exclude_ids: exclude_ids.into_iter().collect(),
            exclude_name_patterns,
        }
    }

    /// Whether an entry should be kept.
    pub fn allows(&self, entry: &CatalogEntry) -> bool {
        if self.exclude_ids.contains(&entry.id) {
            return false;
        }
        !self
            .exclude_name_patterns
            .iter()
            .any(|pattern| pattern.is_match(&entry.name))
    }
}

/// What a discovery pass found.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Unique entries in traversal order.
    pub entries: Vec<CatalogEntry>,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub excluded: usize,
}

/// Accumulates links while keeping pages and entries unique.
#[derive(Default)]
struct Frontier {
    seen_pages: HashSet<String>,
    seen_entries: HashSet<String>,
    next: Vec<PageRef>,
}

impl Frontier {
    fn push(&mut self, link: ExtractedLink, filter: &EntryFilter, report: &mut DiscoveryReport) {
        match link {
            ExtractedLink::Page(page) => {
                if self.seen_pages.insert(normalize_url(&page.url)) {
                    self.next.push(page);
                }
            }
            ExtractedLink::Entry(entry) => {
                if !filter.allows(&entry) {
                    debug!("Excluding {}", entry.label());
                    report.excluded += 1;
                } else if self.seen_entries.insert(entry.dedup_key().to_string()) {
                    report.entries.push(entry);
                }
            }
        }
    }
}

/// Crawl a catalog site and collect every downloadable entry.
///
/// `categories` restricts the crawl to the given top-level category ids;
/// `None` starts from the index page. A failed index page aborts the run,
/// any other failed page only drops its sub-tree.
pub async fn discover(
    site: &dyn CatalogSite,
    categories: Option<&[String]>,
    filter: &EntryFilter,
    ctx: &RunContext,
) -> Result<DiscoveryReport, SpiderError> {
    let mut report = DiscoveryReport::default();
    let mut frontier = Frontier::default();

    for link in site.seeds(categories) {
        frontier.push(link, filter, &mut report);
    }

    let fetcher = ctx.fetcher.as_ref();
    let retry = &ctx.retry;
    let mut depth = 0;

    while !frontier.next.is_empty() {
        if ctx.shutdown.is_cancelled() {
            return Err(SpiderError::Interrupted);
        }

        let level = std::mem::take(&mut frontier.next);
        debug!(
            "{} discovery depth {}: {} page(s)",
            site.source(),
            depth,
            level.len()
        );

        let fetches = stream::iter(level.into_iter().map(|page| async move {
            let url = page.url.as_str();
            let attempted: Attempted<String> =
                retry.run(url, move |_| fetcher.fetch_text(url)).await;
            (page, attempted)
        }))
        .buffered(ctx.discovery_concurrency)
        .collect::<Vec<_>>();

        let fetched = tokio::select! {
            fetched = fetches => fetched,
            _ = ctx.shutdown.cancelled() => return Err(SpiderError::Interrupted),
        };

        for (page, attempted) in fetched {
            match attempted.result {
                Ok(html) => {
                    report.pages_fetched += 1;
                    for link in site.extract_links(&page, &html) {
                        frontier.push(link, filter, &mut report);
                    }
                }
                Err(error) if page.kind == PageKind::Index => {
                    return Err(SpiderError::RootUnreachable {
                        source_kind: site.source(),
                        url: page.url,
                        error,
                    });
                }
                Err(error) => {
                    report.pages_failed += 1;
                    warn!(
                        "Skipping {} page {} after {} attempt(s): {}",
                        site.source(),
                        page.url,
                        attempted.attempts,
                        error
                    );
                }
            }
        }

        depth += 1;
    }

    info!(
        "{} discovery complete: {} entries from {} pages ({} failed, {} excluded)",
        site.source(),
        report.entries.len(),
        report.pages_fetched,
        report.pages_failed,
        report.excluded
    );

    Ok(report)
}
