//! Google Calendar API client.

use serde::Deserialize;
use tracing::{debug, info};

use telecal_core::{CalendarEvent, EventLink};

use crate::credential::Credential;
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarProvider};

use super::config::GoogleConfig;
use super::oauth::build_http_client;

/// Base URL for Google Calendar API v3.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google Calendar API client.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    calendar_id: String,
    api_base: String,
}

impl GoogleCalendarClient {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        Ok(Self {
            http_client: build_http_client(config.timeout, &config.user_agent)?,
            calendar_id: config.calendar_id.clone(),
            api_base: CALENDAR_API_BASE.to_string(),
        })
    }

    /// Points the client at another API root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(&self.calendar_id)
        )
    }

    /// Inserts `event` and returns the link to the created entry.
    pub async fn insert(&self, event: &CalendarEvent, access_token: &str) -> ProviderResult<EventLink> {
        let url = self.events_url();
        debug!(stage = "calendar", calendar = %self.calendar_id, "inserting event");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(|e| {
                let err = if e.is_timeout() {
                    ProviderError::network("request timeout")
                } else if e.is_connect() {
                    ProviderError::network(format!("connection failed: {}", e))
                } else {
                    ProviderError::network(format!("request failed: {}", e))
                };
                err.with_provider("google")
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e)).with_provider("google")
        })?;

        if !status.is_success() {
            return Err(status_error(status, &body).with_provider("google"));
        }

        let inserted: InsertedEvent = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse response: {}", e))
                .with_provider("google")
        })?;

        info!(stage = "calendar", event_id = ?inserted.id, "event created");
        Ok(EventLink {
            id: inserted.id,
            html_link: inserted.html_link,
        })
    }
}

impl CalendarProvider for GoogleCalendarClient {
    fn name(&self) -> &str {
        "google"
    }

    fn insert_event<'a>(
        &'a self,
        event: &'a CalendarEvent,
        credential: &'a Credential,
    ) -> BoxFuture<'a, ProviderResult<EventLink>> {
        Box::pin(self.insert(event, &credential.access_token))
    }
}

/// Maps a non-success response to an error, using Google's error message
/// when the body carries one.
fn status_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|r| r.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        reqwest::StatusCode::UNAUTHORIZED => {
            ProviderError::authentication(format!("access token rejected: {}", message))
        }
        reqwest::StatusCode::FORBIDDEN => ProviderError::authorization(message),
        reqwest::StatusCode::NOT_FOUND => ProviderError::not_found(message),
        reqwest::StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(message),
        s if s.is_client_error() => ProviderError::bad_request(message),
        s => ProviderError::server(format!("API error ({}): {}", s, message)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertedEvent {
    id: Option<String>,
    html_link: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::google::OAuthCredentials;

    fn config() -> GoogleConfig {
        GoogleConfig::new(
            OAuthCredentials::new("c.apps.googleusercontent.com", "s"),
            "https://bot.example.com/auth/callback",
        )
    }

    #[test]
    fn events_url_encodes_calendar_id() {
        let client = GoogleCalendarClient::new(&config().with_calendar_id("team@group.calendar.google.com"))
            .unwrap();
        assert_eq!(
            client.events_url(),
            "https://www.googleapis.com/calendar/v3/calendars/team%40group.calendar.google.com/events"
        );

        let client = GoogleCalendarClient::new(&config())
            .unwrap()
            .with_api_base("http://localhost:9999/");
        assert_eq!(client.events_url(), "http://localhost:9999/calendars/primary/events");
    }

    #[test]
    fn status_error_uses_api_message() {
        let body = r#"{"error": {"code": 400, "message": "Bad Request: invalid start time", "errors": []}}"#;
        let err = status_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert_eq!(err.code(), ProviderErrorCode::BadRequest);
        assert_eq!(err.message(), "Bad Request: invalid start time");
    }

    #[test]
    fn status_error_codes() {
        assert_eq!(
            status_error(reqwest::StatusCode::UNAUTHORIZED, "").code(),
            ProviderErrorCode::AuthenticationFailed
        );
        assert_eq!(
            status_error(reqwest::StatusCode::FORBIDDEN, "nope").code(),
            ProviderErrorCode::AuthorizationFailed
        );
        assert_eq!(
            status_error(reqwest::StatusCode::NOT_FOUND, "").code(),
            ProviderErrorCode::NotFound
        );
        assert_eq!(
            status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "").code(),
            ProviderErrorCode::RateLimited
        );
        let err = status_error(reqwest::StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert_eq!(err.code(), ProviderErrorCode::ServerError);
        assert!(err.message().contains("oops"));
    }

    #[test]
    fn inserted_event_parsing() {
        let inserted: InsertedEvent = serde_json::from_str(
            r#"{"kind": "calendar#event", "id": "evt1", "htmlLink": "https://www.google.com/calendar/event?eid=evt1"}"#,
        )
        .unwrap();
        assert_eq!(inserted.id.as_deref(), Some("evt1"));
        assert!(inserted.html_link.ends_with("eid=evt1"));
    }
}
