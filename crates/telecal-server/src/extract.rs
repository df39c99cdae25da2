//! Event extraction from free text through Gemini.
//!
//! The model is asked for a JSON object shaped like [`EventDraft`]; the
//! request pins `responseMimeType` and a `responseSchema` so the reply can
//! be decoded directly.

use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use secrecy::{ExposeSecret, Secret};
use thiserror::Error;
use tracing::{debug, trace, warn};

use telecal_core::{DraftError, EventDraft};
use telecal_providers::BoxFuture;

/// Default Gemini API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Errors produced while extracting a draft.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction request failed: {0}")]
    Request(String),

    #[error("extraction API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("extraction response contained no text")]
    EmptyResponse,

    /// The model answered but its fields do not decode.
    #[error("invalid event draft: {0}")]
    Draft(#[from] DraftError),
}

impl ExtractionError {
    /// Pipeline stage the failure belongs to, for logging.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Draft(_) => "merge",
            _ => "extraction",
        }
    }
}

/// Turns a chat message into an [`EventDraft`].
pub trait EventExtractor: Send + Sync {
    /// Extracts a draft from `text`. `now` is the current local time the
    /// model uses to resolve relative dates.
    fn extract<'a>(
        &'a self,
        text: &'a str,
        now: DateTime<FixedOffset>,
    ) -> BoxFuture<'a, Result<EventDraft, ExtractionError>>;
}

/// Gemini settings after secret resolution.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`EventExtractor`] backed by `generateContent`.
#[derive(Debug)]
pub struct GeminiExtractor {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiExtractor {
    pub fn new(config: GeminiConfig) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExtractionError::Request(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }

    async fn generate(
        &self,
        text: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<EventDraft, ExtractionError> {
        let body = request_body(text, now);
        debug!(stage = "extraction", model = %self.config.model, "gemini request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(stage = "extraction", status = %status, body = %body, "gemini API error");
            return Err(ExtractionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExtractionError::Request(format!("invalid response body: {}", e)))?;
        trace!(response = %reply, "gemini raw response");

        let text = response_text(&reply).ok_or(ExtractionError::EmptyResponse)?;
        debug!(stage = "extraction", draft = %text, "gemini response");
        Ok(EventDraft::from_json(strip_code_fence(&text))?)
    }
}

impl EventExtractor for GeminiExtractor {
    fn extract<'a>(
        &'a self,
        text: &'a str,
        now: DateTime<FixedOffset>,
    ) -> BoxFuture<'a, Result<EventDraft, ExtractionError>> {
        Box::pin(self.generate(text, now))
    }
}

/// Instruction prepended to every message.
pub fn prompt(now: DateTime<FixedOffset>) -> String {
    format!(
        "The current time is: {now}\n\
         Fill in the JSON object described below from the message that follows. \
         Return only JSON matching the schema.\n\
         \n\
         - `summary`: event title\n\
         - `location`: event location (optional; put any word that reads like a place here, \
         even if it is not a formal address)\n\
         - `description`: details (optional)\n\
         - `start_time`: start time in RFC 3339 format, e.g. \"2025-05-11T15:00:00+08:00\"\n\
         - `end_time`: end time (optional; if start_time is present and no end is given, \
         set it to one hour after the start)\n\
         - `reminder_minutes`: reminder offsets in minutes. Always include one day and two \
         days before; add more if useful, up to five in total\n\
         \n\
         Notes:\n\
         - Return JSON only, no explanations.\n\
         - Leave out any field that cannot be determined clearly.\n\
         \n",
        now = now.to_rfc3339()
    )
}

fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING" },
            "location": { "type": "STRING" },
            "description": { "type": "STRING" },
            "start_time": { "type": "STRING", "format": "date-time" },
            "end_time": { "type": "STRING", "format": "date-time" },
            "reminder_minutes": { "type": "ARRAY", "items": { "type": "INTEGER" } }
        }
    })
}

fn request_body(text: &str, now: DateTime<FixedOffset>) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": format!("{}{}", prompt(now), text) }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(),
        }
    })
}

/// Concatenates the text parts of the first candidate.
fn response_text(reply: &serde_json::Value) -> Option<String> {
    let parts = reply["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.trim().is_empty() { None } else { Some(text) }
}

/// Drops a surrounding Markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
