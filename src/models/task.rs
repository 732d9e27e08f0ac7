//! Fetch tasks and their outcomes.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::CatalogEntry;

/// A planned download: one catalog entry and where its files go.
#[derive(Debug, Clone)]
pub struct FetchTask {
    pub entry: CatalogEntry,
    /// Where the raw downloaded bytes are written.
    pub destination: PathBuf,
    /// Where archive contents are extracted when the download is a zip.
    pub extract_dir: PathBuf,
}

impl FetchTask {
    pub fn new(entry: CatalogEntry, destination: PathBuf) -> Self {
        let extract_dir = destination.with_extension("");
        Self {
            entry,
            destination,
            extract_dir,
        }
    }

    /// Temporary path the body is streamed to before being renamed into place.
    pub fn partial_path(&self) -> PathBuf {
        let mut name = self
            .destination
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        self.destination.with_file_name(name)
    }

    /// True if a previous run already produced usable output for this task.
    pub fn is_present(&self) -> bool {
        is_non_empty_file(&self.destination) || is_non_empty_dir(&self.extract_dir)
    }

    /// Path that represents this task's output on disk, if any.
    pub fn present_path(&self) -> Option<&Path> {
        if is_non_empty_file(&self.destination) {
            Some(&self.destination)
        } else if is_non_empty_dir(&self.extract_dir) {
            Some(&self.extract_dir)
        } else {
            None
        }
    }
}

fn is_non_empty_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

fn is_non_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// How a single task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Downloaded and normalized.
    Succeeded {
        path: PathBuf,
        bytes: u64,
        files: usize,
    },
    /// Output already present from an earlier run; nothing was requested.
    Skipped { path: PathBuf },
    /// Gave up on this entry.
    Failed { reason: String, permanent: bool },
}

/// Result of processing one task, used for reporting only.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub label: String,
    pub url: String,
    /// Number of HTTP attempts made (0 when skipped).
    pub attempts: u32,
    pub outcome: FetchOutcome,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Succeeded { .. })
    }
}

/// A failed entry as shown in the end-of-run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEntry {
    pub label: String,
    pub url: String,
    pub reason: String,
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Bytes downloaded during this run.
    pub bytes: u64,
    /// HTTP requests issued for downloads, retries included.
    pub requests: usize,
    /// Most download requests that were in flight at once.
    pub peak_in_flight: usize,
    /// Set when the run was cancelled before every task was attempted.
    pub interrupted: bool,
    pub failures: Vec<FailedEntry>,
}

impl RunSummary {
    /// Fold a batch of task results into a summary.
    pub fn from_results(results: &[FetchResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.record(result);
        }
        summary
    }

    pub fn record(&mut self, result: &FetchResult) {
        match &result.outcome {
            FetchOutcome::Succeeded { bytes, .. } => {
                self.succeeded += 1;
                self.bytes += bytes;
            }
            FetchOutcome::Skipped { .. } => self.skipped += 1,
            FetchOutcome::Failed { reason, .. } => {
                self.failed += 1;
                self.failures.push(FailedEntry {
                    label: result.label.clone(),
                    url: result.url.clone(),
                    reason: reason.clone(),
                });
            }
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{succeeded:{}, skipped:{}, failed:{}}}",
            self.succeeded, self.skipped, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryPath, SourceKind};

    fn entry() -> CatalogEntry {
        CatalogEntry {
            source: SourceKind::Sougou,
            category: CategoryPath::root("医学_1"),
            name: "药品".to_string(),
            id: "42".to_string(),
            url: "https://example.com/42".to_string(),
            size_hint: None,
        }
    }

    #[test]
    fn test_task_paths() {
        let task = FetchTask::new(entry(), PathBuf::from("out/医学_1/药品_42.scel"));
        assert_eq!(task.partial_path(), PathBuf::from("out/医学_1/药品_42.scel.part"));
        assert_eq!(task.extract_dir, PathBuf::from("out/医学_1/药品_42"));
    }

    #[test]
    fn test_is_present_requires_content() {
        let dir = tempfile::tempdir().unwrap();
        let task = FetchTask::new(entry(), dir.path().join("药品_42.scel"));
        assert!(!task.is_present());

        std::fs::write(&task.destination, b"").unwrap();
        assert!(!task.is_present());

        std::fs::write(&task.destination, b"data").unwrap();
        assert!(task.is_present());
        assert_eq!(task.present_path(), Some(task.destination.as_path()));
    }

    #[test]
    fn test_is_present_for_extracted_archive() {
        let dir = tempfile::tempdir().unwrap();
        let task = FetchTask::new(entry(), dir.path().join("药品_42.zip"));
        std::fs::create_dir_all(&task.extract_dir).unwrap();
        assert!(!task.is_present());

        std::fs::write(task.extract_dir.join("inner.scel"), b"x").unwrap();
        assert!(task.is_present());
    }

    #[test]
    fn test_summary_display() {
        let ok = FetchResult {
            label: "a".into(),
            url: "u1".into(),
            attempts: 1,
            outcome: FetchOutcome::Succeeded {
                path: PathBuf::from("a"),
                bytes: 10,
                files: 1,
            },
        };
        let bad = FetchResult {
            label: "b".into(),
            url: "u2".into(),
            attempts: 1,
            outcome: FetchOutcome::Failed {
                reason: "HTTP 404".into(),
                permanent: true,
            },
        };
        let summary = RunSummary::from_results(&[ok.clone(), ok, bad]);
        assert_eq!(summary.to_string(), "{succeeded:2, skipped:0, failed:1}");
        assert_eq!(summary.bytes, 20);
        assert_eq!(summary.failures[0].reason, "HTTP 404");
    }
}
