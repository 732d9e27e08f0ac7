//! Fetch abstraction shared by discovery and downloading.

use async_trait::async_trait;

use super::FetchError;

/// Something that can turn a URL into bytes.
///
/// The HTTP client implements this for real runs; tests substitute
/// in-memory stubs.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the body of `url`. Non-2xx responses are errors.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// Fetch a page and decode it as (lossy) UTF-8.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let bytes = self.fetch(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
