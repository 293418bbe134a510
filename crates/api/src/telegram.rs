//! Telegram Bot API notification channel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::TransportError;

/// Opaque channel credentials: bot token plus destination chat id.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

impl ChannelCredentials {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Both token and destination are present.
    pub fn is_complete(&self) -> bool {
        !self.bot_token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }
}

impl std::fmt::Debug for ChannelCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelCredentials")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// Fire-and-forget text sink.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver `text` to the destination addressed by `credentials`.
    async fn send(
        &self,
        credentials: &ChannelCredentials,
        text: &str,
    ) -> Result<(), TransportError>;
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram `sendMessage` client.
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Default for TelegramClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TelegramClient {
    /// Default request timeout.
    const TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a client against the public Bot API.
    pub fn new() -> Self {
        Self::with_base_url("https://api.telegram.org")
    }

    /// Create a client with custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn send_message_url(&self, bot_token: &str) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, bot_token)
    }
}

#[async_trait]
impl NotificationChannel for TelegramClient {
    #[instrument(skip(self, credentials, text), fields(chat_id = %credentials.chat_id))]
    async fn send(
        &self,
        credentials: &ChannelCredentials,
        text: &str,
    ) -> Result<(), TransportError> {
        if !credentials.is_complete() {
            return Err(TransportError::MissingCredentials);
        }

        let body = SendMessageRequest {
            chat_id: &credentials.chat_id,
            text,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.send_message_url(&credentials.bot_token))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Option<ApiResponse> = response.json().await.ok();

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                description: payload
                    .and_then(|p| p.description)
                    .unwrap_or_else(|| status.to_string()),
            });
        }

        match payload {
            Some(ApiResponse { ok: true, .. }) => {
                debug!(len = text.len(), "Message delivered");
                Ok(())
            }
            Some(ApiResponse { description, .. }) => Err(TransportError::Rejected(
                description.unwrap_or_else(|| "unknown reason".to_string()),
            )),
            None => Err(TransportError::Rejected("unreadable response body".to_string())),
        }
    }
}
