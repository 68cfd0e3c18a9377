//! Error types for the stores.

use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a state file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A state file could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Polling interval below the allowed minimum.
    #[error("interval must be at least {min} minutes, got {minutes}")]
    InvalidInterval { minutes: u32, min: u32 },

    /// Search keyword too short to be useful.
    #[error("position must be at least {min} characters")]
    PositionTooShort { min: usize },

    /// Region id outside the supported table.
    #[error("unknown area id: {0}")]
    UnknownArea(u32),

    /// Experience code not recognised.
    #[error("unknown experience level: {0}")]
    UnknownExperience(String),

    /// Input that should have been a number.
    #[error("not a valid number: {0}")]
    InvalidNumber(String),
}
