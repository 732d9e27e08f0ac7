//! Fetch error taxonomy.

use thiserror::Error;

/// Errors from a single HTTP fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("empty response body")]
    EmptyBody,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl FetchError {
    /// Classify a reqwest error.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_builder() {
            Self::InvalidUrl(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }

    /// Whether another attempt might succeed.
    ///
    /// Timeouts, connection problems, truncated or empty bodies, 429 and 5xx
    /// are transient. Every other 4xx and malformed URLs are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) | Self::Body(_) | Self::EmptyBody => true,
            Self::Request(_) => true,
            Self::Status(code) => is_transient_status(*code),
            Self::InvalidUrl(_) => false,
        }
    }
}

/// 429 and 5xx are worth retrying.
pub fn is_transient_status(code: u16) -> bool {
    code == 429 || (500..600).contains(&code)
}
