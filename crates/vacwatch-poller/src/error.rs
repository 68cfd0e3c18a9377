//! Error types for the poller.

use thiserror::Error;

/// Errors returned by poller lifecycle operations.
#[derive(Debug, Error)]
pub enum PollerError {
    /// Polling needs a search keyword.
    #[error("no position set, refusing to start polling")]
    MissingPosition,
}

/// A single message could not be delivered.
#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
