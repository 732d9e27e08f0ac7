//! Data models for the dictionary spider.

mod entry;
mod task;

pub use entry::{CatalogEntry, CategoryPath, SourceKind};
pub use task::{FailedEntry, FetchOutcome, FetchResult, FetchTask, RunSummary};
