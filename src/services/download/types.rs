//! Download service types and events.

use crate::models::{FetchOutcome, FetchResult, RunSummary};

/// Events emitted during download operations.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// A worker picked up a task.
    Started { worker_id: usize, label: String },
    /// Output already on disk, nothing requested.
    Skipped { worker_id: usize, label: String },
    /// Download written and normalized.
    Completed {
        worker_id: usize,
        label: String,
        bytes: u64,
    },
    /// Gave up on a task.
    Failed {
        worker_id: usize,
        label: String,
        error: String,
    },
}

impl DownloadEvent {
    pub(super) fn for_result(worker_id: usize, result: &FetchResult) -> Self {
        let label = result.label.clone();
        match &result.outcome {
            FetchOutcome::Succeeded { bytes, .. } => Self::Completed {
                worker_id,
                label,
                bytes: *bytes,
            },
            FetchOutcome::Skipped { .. } => Self::Skipped { worker_id, label },
            FetchOutcome::Failed { reason, .. } => Self::Failed {
                worker_id,
                label,
                error: reason.clone(),
            },
        }
    }
}

/// Result of a download operation.
#[derive(Debug, Default)]
pub struct DownloadResult {
    /// Per-task results in planning order. Tasks never attempted are absent.
    pub results: Vec<FetchResult>,
    pub summary: RunSummary,
}
