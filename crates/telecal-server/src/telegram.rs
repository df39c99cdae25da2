//! Telegram Bot API client and webhook update types.

use std::time::Duration;

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use tracing::{debug, info, warn};

use telecal_providers::{BoxFuture, Notifier};

use crate::error::{ServerError, ServerResult};

/// Default Bot API root.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram bot settings after secret resolution.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: Secret<String>,
    /// The single chat the bot serves and notifies.
    pub chat_id: i64,
    pub api_base: String,
    pub timeout: Duration,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: i64) -> Self {
        Self {
            bot_token: Secret::new(bot_token.into()),
            chat_id,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Minimal Bot API client.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    config: TelegramConfig,
    http_client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> ServerResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServerError::telegram(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// The configured chat.
    pub fn chat_id(&self) -> i64 {
        self.config.chat_id
    }

    /// Path segment the webhook is served under.
    pub fn webhook_path(&self) -> String {
        format!("/{}", self.config.bot_token.expose_secret())
    }

    /// Returns true if `token` matches the bot token.
    pub fn is_bot_token(&self, token: &str) -> bool {
        self.config.bot_token.expose_secret() == token
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base,
            self.config.bot_token.expose_secret(),
            method
        )
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> ServerResult<serde_json::Value> {
        let response = self
            .http_client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| ServerError::telegram(format!("{} request failed: {}", method, e.without_url())))?;

        let status = response.status();
        let reply: ApiResponse = response
            .json()
            .await
            .map_err(|e| ServerError::telegram(format!("invalid {} response: {}", method, e.without_url())))?;

        if !reply.ok {
            return Err(ServerError::telegram(format!(
                "{} failed ({}): {}",
                method,
                status,
                reply.description.unwrap_or_default()
            )));
        }
        Ok(reply.result.unwrap_or(serde_json::Value::Null))
    }

    /// Sends a plain text message.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> ServerResult<()> {
        debug!(stage = "notify", chat_id, "sending message");
        self.call(
            "sendMessage",
            serde_json::json!({ "chat_id": chat_id, "text": text }),
        )
        .await?;
        Ok(())
    }

    /// Points the bot's webhook at `{public_url}/{bot_token}`.
    pub async fn set_webhook(&self, public_url: &str) -> ServerResult<()> {
        let url = format!("{}{}", public_url.trim_end_matches('/'), self.webhook_path());
        self.call("setWebhook", serde_json::json!({ "url": url })).await?;
        info!(public_url, "webhook registered");
        Ok(())
    }
}

impl Notifier for TelegramClient {
    fn notify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Err(e) = self.send_message(self.config.chat_id, text).await {
                warn!(stage = "notify", error = %e, "failed to deliver message");
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    description: Option<String>,
}

/// An incoming webhook update. Only the fields the bot reads are decoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: Option<i64>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
}

impl Message {
    /// Returns true if a bot sent the message.
    pub fn from_bot(&self) -> bool {
        self.from.as_ref().is_some_and(|u| u.is_bot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TelegramClient {
        TelegramClient::new(
            TelegramConfig::new("123:abc", 42).with_api_base("http://localhost:9999/"),
        )
        .unwrap()
    }

    #[test]
    fn method_url_includes_token() {
        let client = client();
        assert_eq!(
            client.method_url("sendMessage"),
            "http://localhost:9999/bot123:abc/sendMessage"
        );
        assert_eq!(client.webhook_path(), "/123:abc");
        assert!(client.is_bot_token("123:abc"));
        assert!(!client.is_bot_token("123:abd"));
    }

    #[test]
    fn config_debug_hides_token() {
        let config = TelegramConfig::new("123:abc", 42);
        let debug = format!("{:?}", config);
        assert!(!debug.contains("123:abc"));
    }

    #[test]
    fn update_with_text_message() {
        let update: Update = serde_json::from_str(
            r#"{
                "update_id": 10,
                "message": {
                    "message_id": 1,
                    "date": 1715400000,
                    "chat": {"id": 42, "type": "private"},
                    "from": {"id": 7, "is_bot": false, "first_name": "A"},
                    "text": "Dentist tomorrow 3pm"
                }
            }"#,
        )
        .unwrap();
        let message = update.message.unwrap();
        assert_eq!(update.update_id, Some(10));
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.text.as_deref(), Some("Dentist tomorrow 3pm"));
        assert!(!message.from_bot());
    }

    #[test]
    fn update_without_message() {
        let update: Update =
            serde_json::from_str(r#"{"update_id": 11, "edited_message": {}}"#).unwrap();
        assert!(update.message.is_none());
    }

    #[test]
    fn bot_sender_detected() {
        let update: Update = serde_json::from_str(
            r#"{"message": {"chat": {"id": 42}, "from": {"id": 9, "is_bot": true}}}"#,
        )
        .unwrap();
        let message = update.message.unwrap();
        assert!(message.from_bot());
        assert!(message.text.is_none());
    }

    #[test]
    fn api_response_error() {
        let reply: ApiResponse =
            serde_json::from_str(r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#)
                .unwrap();
        assert!(!reply.ok);
        assert_eq!(reply.description.as_deref(), Some("Unauthorized"));
    }
}
