//! Telegram Bot API client for vacwatch.
//!
//! Covers the three calls the bot needs:
//! - `getMe` to validate the token at boot
//! - `getUpdates` long polling for incoming commands
//! - `sendMessage` for replies and vacancy notifications
//!
//! [`TelegramClient`] also implements [`vacwatch_poller::Delivery`], so the
//! polling loop can send through it directly.

mod client;
mod error;
mod types;

pub use client::{DEFAULT_API_URL, REQUEST_TIMEOUT, TelegramClient};
pub use error::TelegramError;
pub use types::{Chat, Message, Update, User};
