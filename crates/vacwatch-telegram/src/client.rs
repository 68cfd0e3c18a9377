//! Bot API client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use vacwatch_poller::{Delivery, DeliveryError};

use crate::TelegramError;
use crate::types::{ApiResponse, Message, Update, User};

/// Public Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Timeout for calls that are not long polls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Bot API client bound to one token.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    base_url: String,
    token: String,
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl TelegramClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, TelegramError> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Identity of the bot. Fails with [`TelegramError::Unauthorized`] for a
    /// bad token.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &json!({}), REQUEST_TIMEOUT).await
    }

    /// Long-poll for updates after `offset`, waiting up to `timeout` for one
    /// to arrive.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, TelegramError> {
        let mut body = json!({
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", &body, timeout + REQUEST_TIMEOUT)
            .await
    }

    /// Send an HTML message with link previews disabled.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, TelegramError> {
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        self.call("sendMessage", &body, REQUEST_TIMEOUT).await
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);

        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(method, status = status.as_u16(), "bot api response");

        let envelope: ApiResponse<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(TelegramError::Api {
                    code: i64::from(status.as_u16()),
                    description: text,
                });
            }
        };

        if envelope.ok
            && let Some(result) = envelope.result
        {
            return Ok(result);
        }

        let code = envelope.error_code.unwrap_or(i64::from(status.as_u16()));
        let description = envelope
            .description
            .unwrap_or_else(|| "no description".to_string());

        Err(match code {
            401 => TelegramError::Unauthorized(description),
            429 => TelegramError::RateLimited {
                retry_after_secs: envelope.parameters.and_then(|p| p.retry_after),
            },
            _ => TelegramError::Api { code, description },
        })
    }
}

#[async_trait]
impl Delivery for TelegramClient {
    async fn deliver(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        self.send_message(chat_id, text)
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError::new(e.to_string()))
    }
}
