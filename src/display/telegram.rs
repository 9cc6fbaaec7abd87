//! Telegram Display
//!
//! Publishes and edits poll messages through the Telegram Bot API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{DisplayError, DisplayHandle, DisplayResult, DisplaySink, DisplayTarget, Keyboard};

/// Default Bot API endpoint
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Returned by the API when an edit would not change the message
const NOT_MODIFIED: &str = "message is not modified";

/// Telegram display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    /// Bot token from BotFather
    pub bot_token: String,
    /// Bot API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: default_api_base(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Bot API response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
    chat: SentChat,
}

#[derive(Debug, Deserialize)]
struct SentChat {
    id: i64,
}

/// [`DisplaySink`] backed by the Telegram Bot API
#[derive(Debug)]
pub struct TelegramDisplay {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramDisplay {
    pub fn new(config: TelegramConfig) -> DisplayResult<Self> {
        if config.bot_token.is_empty() {
            return Err(DisplayError::RequestFailed(
                "Bot token is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DisplayError::RequestFailed(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    /// Call a Bot API method and unwrap its envelope
    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> DisplayResult<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| DisplayError::RequestFailed(e.to_string()))?;

        // Failures come back as non-2xx with the same JSON envelope
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| DisplayError::RequestFailed(e.to_string()))?;

        into_result(envelope)
    }
}

fn into_result<T>(envelope: ApiResponse<T>) -> DisplayResult<T> {
    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| DisplayError::RequestFailed("Response has no result".to_string()));
    }

    let code = envelope.error_code.unwrap_or_default();
    if code == 429 {
        let retry_after = envelope
            .parameters
            .and_then(|p| p.retry_after)
            .unwrap_or(1);
        return Err(DisplayError::RateLimited(retry_after));
    }

    Err(DisplayError::Api {
        code,
        description: envelope
            .description
            .unwrap_or_else(|| "Unknown error".to_string()),
    })
}

fn is_not_modified(error: &DisplayError) -> bool {
    matches!(error, DisplayError::Api { description, .. } if description.contains(NOT_MODIFIED))
}

/// `inline_keyboard` reply markup
fn reply_markup(controls: &Keyboard) -> Value {
    let rows: Vec<Vec<Value>> = controls
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| json!({ "text": b.label, "callback_data": b.callback_data }))
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

fn parse_chat_id(target: &DisplayTarget) -> DisplayResult<i64> {
    target
        .as_str()
        .trim()
        .parse()
        .map_err(|_| DisplayError::InvalidTarget(format!("Invalid chat ID: {}", target)))
}

#[async_trait]
impl DisplaySink for TelegramDisplay {
    async fn publish(
        &self,
        target: &DisplayTarget,
        text: &str,
        controls: &Keyboard,
    ) -> DisplayResult<DisplayHandle> {
        let chat_id = parse_chat_id(target)?;
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if !controls.is_empty() {
            body["reply_markup"] = reply_markup(controls);
        }

        let sent: SentMessage = self.call("sendMessage", body).await?;
        debug!(chat_id, message_id = sent.message_id, "published poll message");

        Ok(DisplayHandle::Chat {
            chat_id: sent.chat.id,
            message_id: sent.message_id,
        })
    }

    async fn update(
        &self,
        handle: &DisplayHandle,
        text: &str,
        controls: &Keyboard,
    ) -> DisplayResult<()> {
        let mut body = match handle {
            DisplayHandle::Chat {
                chat_id,
                message_id,
            } => json!({ "chat_id": chat_id, "message_id": message_id, "text": text }),
            DisplayHandle::Inline { inline_message_id } => {
                json!({ "inline_message_id": inline_message_id, "text": text })
            }
        };
        if !controls.is_empty() {
            body["reply_markup"] = reply_markup(controls);
        }

        // Chat edits return the message, inline edits return `true`
        match self.call::<Value>("editMessageText", body).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_modified(&e) => {
                debug!(%handle, "poll message already up to date");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
