//! Service layer for the spider.
//!
//! Domain logic separated from UI concerns; the CLI only wires these
//! together and renders their events.

mod context;
pub mod download;
pub mod normalize;
pub mod shutdown;

pub use context::{RunContext, RunCounters};
pub use download::{DownloadEvent, DownloadResult, DownloadService};
pub use normalize::{Normalized, NormalizeError, Normalizer};
pub use shutdown::{Shutdown, ShutdownSignal};
