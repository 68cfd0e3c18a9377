//! Outbound message channel.

use async_trait::async_trait;

use crate::DeliveryError;

/// Sends rendered vacancy messages to a chat.
///
/// A failure only affects the message at hand; the loop logs it and moves on
/// to the next vacancy.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError>;
}
