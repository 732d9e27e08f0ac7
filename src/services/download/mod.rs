//! Dictionary download service.
//!
//! A fixed pool of workers pulls planned tasks from one shared queue, so at
//! most `concurrency` downloads are ever in flight. Emits events for
//! progress tracking and leaves presentation to the caller.

mod types;

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::context::RunContext;
use super::normalize::Normalizer;
use crate::models::{FetchOutcome, FetchResult, FetchTask, RunSummary};
use crate::scrapers::FetchError;

pub use types::{DownloadEvent, DownloadResult};

/// Service for downloading planned dictionary tasks.
pub struct DownloadService {
    ctx: RunContext,
    normalizer: Normalizer,
}

impl DownloadService {
    pub fn new(ctx: RunContext, normalizer: Normalizer) -> Self {
        Self { ctx, normalizer }
    }

    /// Download every task.
    ///
    /// Progress events go to `event_tx`; a closed receiver is ignored.
    pub async fn download(
        &self,
        tasks: Vec<FetchTask>,
        event_tx: mpsc::Sender<DownloadEvent>,
    ) -> DownloadResult {
        let total = tasks.len();
        if total == 0 {
            return DownloadResult::default();
        }

        let (task_tx, task_rx) = mpsc::channel::<(usize, FetchTask)>(total);
        for indexed in tasks.into_iter().enumerate() {
            if task_tx.send(indexed).await.is_err() {
                break;
            }
        }
        drop(task_tx);

        let task_rx = Arc::new(Mutex::new(task_rx));
        let workers = self.ctx.concurrency.min(total);
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let task_rx = task_rx.clone();
            let ctx = self.ctx.clone();
            let normalizer = self.normalizer.clone();
            let event_tx = event_tx.clone();

            let handle = tokio::spawn(async move {
                let mut finished = Vec::new();

                loop {
                    if ctx.shutdown.is_cancelled() {
                        break;
                    }

                    let next = {
                        let mut rx = task_rx.lock().await;
                        rx.recv().await
                    };
                    let Some((index, task)) = next else {
                        break;
                    };

                    let _ = event_tx
                        .send(DownloadEvent::Started {
                            worker_id,
                            label: task.entry.label(),
                        })
                        .await;

                    let Some(result) = fetch_task(&task, &ctx, &normalizer).await else {
                        break;
                    };

                    let _ = event_tx
                        .send(DownloadEvent::for_result(worker_id, &result))
                        .await;
                    finished.push((index, result));
                }

                finished
            });

            handles.push(handle);
        }

        // Wait for all workers
        let mut indexed = Vec::with_capacity(total);
        for handle in handles {
            match handle.await {
                Ok(finished) => indexed.extend(finished),
                Err(e) => warn!("Download worker panicked: {}", e),
            }
        }
        indexed.sort_by_key(|(index, _)| *index);

        let results: Vec<FetchResult> = indexed.into_iter().map(|(_, r)| r).collect();
        let mut summary = RunSummary::from_results(&results);
        summary.requests = self.ctx.counters.requests();
        summary.peak_in_flight = self.ctx.counters.peak_in_flight();
        summary.interrupted = self.ctx.shutdown.is_cancelled() && results.len() < total;

        for failure in &summary.failures {
            warn!(
                "Failed {} ({}): {}",
                failure.label, failure.url, failure.reason
            );
        }
        info!("Download complete: {}", summary);

        DownloadResult { results, summary }
    }
}

/// Fetch, write and normalize one task.
///
/// Returns `None` when the run was cancelled while the request was in flight.
async fn fetch_task(
    task: &FetchTask,
    ctx: &RunContext,
    normalizer: &Normalizer,
) -> Option<FetchResult> {
    let label = task.entry.label();
    let url = task.entry.url.as_str();

    if let Some(path) = task.present_path() {
        debug!("{} already exists, skipping", path.display());
        return Some(FetchResult {
            label,
            url: url.to_string(),
            attempts: 0,
            outcome: FetchOutcome::Skipped {
                path: path.to_path_buf(),
            },
        });
    }

    let fetcher = ctx.fetcher.as_ref();
    let counters = ctx.counters.as_ref();
    let fetch = ctx.retry.run(&label, move |_| async move {
        let _in_flight = counters.start_request();
        fetcher.fetch(url).await
    });

    let attempted = tokio::select! {
        attempted = fetch => attempted,
        _ = ctx.shutdown.cancelled() => {
            remove_partial(task).await;
            return None;
        }
    };

    let outcome = match attempted.result {
        Ok(bytes) => store(task, bytes, normalizer).await,
        Err(e) => FetchOutcome::Failed {
            reason: e.to_string(),
            permanent: is_final(&e),
        },
    };

    if let FetchOutcome::Succeeded { ref path, bytes, .. } = outcome {
        info!("{} downloaded to {} ({} bytes)", label, path.display(), bytes);
    }

    Some(FetchResult {
        label,
        url: url.to_string(),
        attempts: attempted.attempts,
        outcome,
    })
}

/// An error that exhausted its retries is final for this run. Empty bodies
/// are retried like network errors but reported as permanent.
fn is_final(err: &FetchError) -> bool {
    !err.is_transient() || matches!(err, FetchError::EmptyBody)
}

/// Write the body through a `.part` file, then normalize it.
async fn store(task: &FetchTask, bytes: Vec<u8>, normalizer: &Normalizer) -> FetchOutcome {
    let size = bytes.len() as u64;
    let partial = task.partial_path();

    let written = async {
        if let Some(parent) = task.destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, &task.destination).await
    }
    .await;

    if let Err(e) = written {
        remove_partial(task).await;
        return FetchOutcome::Failed {
            reason: format!("failed to write {}: {}", task.destination.display(), e),
            permanent: true,
        };
    }

    let normalizer = normalizer.clone();
    let owned = task.clone();
    match tokio::task::spawn_blocking(move || normalizer.normalize(&owned)).await {
        Ok(Ok(normalized)) => FetchOutcome::Succeeded {
            path: normalized.path().to_path_buf(),
            bytes: size,
            files: normalized.files(),
        },
        Ok(Err(e)) => FetchOutcome::Failed {
            reason: e.to_string(),
            permanent: true,
        },
        Err(e) => {
            super::normalize::discard(task);
            FetchOutcome::Failed {
                reason: format!("normalization task failed: {}", e),
                permanent: true,
            }
        }
    }
}

async fn remove_partial(task: &FetchTask) {
    let partial = task.partial_path();
    if let Err(e) = tokio::fs::remove_file(&partial).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", partial.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogEntry, CategoryPath, SourceKind};
    use crate::scrapers::{Fetcher, RetryPolicy};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    struct MapFetcher(HashMap<String, Result<Vec<u8>, FetchError>>);

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.0.get(url).cloned().unwrap_or(Err(FetchError::Status(404)))
        }
    }

    fn task(dir: &std::path::Path, id: &str) -> FetchTask {
        let entry = CatalogEntry {
            source: SourceKind::Baidu,
            category: CategoryPath::root("c_1"),
            name: format!("dict{id}"),
            id: id.to_string(),
            url: format!("https://example.com/{id}"),
            size_hint: None,
        };
        FetchTask::new(entry, dir.join(format!("c_1/dict{id}_{id}.bdict")))
    }

    fn service(fetcher: MapFetcher, concurrency: usize) -> DownloadService {
        let retry = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_millis(1),
        };
        DownloadService::new(
            RunContext::new(Arc::new(fetcher), retry, concurrency),
            Normalizer::new(),
        )
    }

    #[tokio::test]
    async fn test_download_writes_files_in_order() {
        let dir = TempDir::new().unwrap();
        let fetcher = MapFetcher(HashMap::from([
            ("https://example.com/1".to_string(), Ok(b"one".to_vec())),
            ("https://example.com/2".to_string(), Ok(b"two".to_vec())),
        ]));
        let tasks = vec![task(dir.path(), "1"), task(dir.path(), "2"), task(dir.path(), "3")];
        let (tx, _rx) = mpsc::channel(16);

        let result = service(fetcher, 2).download(tasks.clone(), tx).await;

        assert_eq!(result.summary.succeeded, 2);
        assert_eq!(result.summary.failed, 1);
        assert_eq!(result.results[2].attempts, 1);
        assert_eq!(std::fs::read(&tasks[0].destination).unwrap(), b"one");
        assert!(!tasks[0].partial_path().exists());
        assert!(!tasks[2].destination.exists());
    }

    #[tokio::test]
    async fn test_present_output_is_skipped() {
        let dir = TempDir::new().unwrap();
        let planned = task(dir.path(), "1");
        std::fs::create_dir_all(planned.destination.parent().unwrap()).unwrap();
        std::fs::write(&planned.destination, b"existing").unwrap();
        let (tx, _rx) = mpsc::channel(16);

        let result = service(MapFetcher(HashMap::new()), 1)
            .download(vec![planned.clone()], tx)
            .await;

        assert_eq!(result.summary.skipped, 1);
        assert_eq!(result.results[0].attempts, 0);
        assert_eq!(std::fs::read(&planned.destination).unwrap(), b"existing");
    }

    #[test]
    fn test_empty_body_is_final() {
        assert!(is_final(&FetchError::EmptyBody));
        assert!(is_final(&FetchError::Status(404)));
        assert!(!is_final(&FetchError::Timeout));
    }
}
