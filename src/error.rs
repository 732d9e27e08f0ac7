//! Run-level errors.
//!
//! Per-entry problems never end up here; they are recorded in the run
//! summary instead. Only failures that make the whole run pointless do.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::SourceKind;
use crate::scrapers::FetchError;

#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("{source_kind} catalog root {url} unreachable: {error}")]
    RootUnreachable {
        source_kind: SourceKind,
        url: String,
        error: FetchError,
    },

    #[error("run interrupted")]
    Interrupted,

    #[error("I/O error at {path}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

impl SpiderError {
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            error,
        }
    }
}
