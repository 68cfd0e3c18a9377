//! Error types for the Telegram client.

use thiserror::Error;

/// Errors that can occur when calling the Bot API.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The bot token was rejected.
    #[error("bot token rejected: {0}")]
    Unauthorized(String),

    /// Flood control.
    #[error("rate limited{}", retry_after_secs.map(|s| format!(" (retry after {}s)", s)).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// The API answered `ok: false`, or a non-JSON error page.
    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },
}
