//! Error types for the hh.ru client.

use thiserror::Error;

/// Errors that can occur when querying hh.ru.
#[derive(Debug, Error)]
pub enum HhError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Rate limited.
    #[error("rate limited{}", retry_after_secs.map(|s| format!(" (retry after {}s)", s)).unwrap_or_default())]
    RateLimited {
        /// Seconds to wait before retrying (from Retry-After header, optional).
        retry_after_secs: Option<u64>,
    },

    /// Non-success status from the API.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

impl HhError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, HhError::Http(e) if e.is_timeout())
    }
}
