//! Network plumbing shared by catalog discovery and downloading.

mod error;
mod fetcher;
mod http_client;
pub mod rate_limiter;
mod retry;

pub use error::{is_transient_status, FetchError};
pub use fetcher::Fetcher;
pub use http_client::{resolve_user_agent, HttpClient, USER_AGENT};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use retry::{Attempted, RetryPolicy};
