//! Application wiring and the HTTP server.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use telecal_core::CalendarEvent;
use telecal_providers::google::{GoogleCalendarClient, OAuthClient};
use telecal_providers::{
    AuthorizationCallback, AuthorizationCoordinator, AuthorizationFlag, CredentialStore,
};

use crate::config::Settings;
use crate::error::ServerResult;
use crate::extract::GeminiExtractor;
use crate::handler::RequestHandler;
use crate::routes;
use crate::signals::ShutdownSignal;
use crate::telegram::TelegramClient;

/// State shared by all routes. Read-only after startup; the credential
/// slot lives in the files owned by the coordinator.
pub struct AppContext {
    pub handler: RequestHandler,
    pub coordinator: Arc<AuthorizationCoordinator>,
    pub callback: AuthorizationCallback,
    pub telegram: TelegramClient,
}

impl AppContext {
    pub fn new(
        handler: RequestHandler,
        coordinator: Arc<AuthorizationCoordinator>,
        telegram: TelegramClient,
    ) -> Self {
        let callback = coordinator.callback();
        Self {
            handler,
            coordinator,
            callback,
            telegram,
        }
    }

    /// Builds the production context from resolved settings.
    ///
    /// The default event starts now, in the configured zone. Requests
    /// waiting for authorization give up once `shutdown` fires.
    pub fn from_settings(settings: &Settings, shutdown: &ShutdownSignal) -> ServerResult<Self> {
        let telegram = TelegramClient::new(settings.telegram.clone())?;
        let coordinator =
            Arc::new(coordinator(settings, &telegram)?.with_shutdown(shutdown.receiver()));
        let extractor = GeminiExtractor::new(settings.gemini.clone())?;
        let calendar = GoogleCalendarClient::new(&settings.google)?;

        let mut template = CalendarEvent::template(
            settings.clock.now(),
            settings.clock.zone_name(),
            settings.attendee.as_str(),
        );
        template.summary = settings.summary.clone();
        info!(
            start = %template.start.date_time,
            zone = settings.clock.zone_name(),
            "default event prepared"
        );

        let handler = RequestHandler::new(
            Arc::new(extractor),
            Arc::clone(&coordinator),
            Arc::new(calendar),
            Arc::new(telegram.clone()),
            template,
            settings.clock,
            telegram.chat_id(),
        );

        Ok(Self::new(handler, coordinator, telegram))
    }
}

/// Builds the credential coordinator. Prompts go to the Telegram chat.
pub fn coordinator(
    settings: &Settings,
    telegram: &TelegramClient,
) -> ServerResult<AuthorizationCoordinator> {
    let google = &settings.google;
    Ok(AuthorizationCoordinator::new(
        CredentialStore::new(&google.token_path),
        Arc::new(AuthorizationFlag::new(&google.flag_path)),
        Arc::new(OAuthClient::new(google)?),
        Arc::new(telegram.clone()),
        settings.authorization,
    ))
}

/// How long in-flight requests may run after shutdown is signaled.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the HTTP server until `shutdown` fires.
pub async fn serve(settings: Settings, shutdown: ShutdownSignal) -> ServerResult<()> {
    let ctx = Arc::new(AppContext::from_settings(&settings, &shutdown)?);

    let listener = TcpListener::bind(settings.listen).await?;
    info!(addr = %listener.local_addr()?, public_url = %settings.public_url, "listening");

    if settings.register_webhook {
        // The server keeps running without a webhook; Telegram just won't
        // deliver until it is registered.
        if let Err(e) = ctx.telegram.set_webhook(&settings.public_url).await {
            warn!(error = %e, "failed to register webhook");
        }
    }

    let status = ctx.coordinator.status()?;
    info!(
        credential = %status.state,
        pending = status.pending,
        "credential state"
    );

    run(listener, ctx, shutdown, DRAIN_TIMEOUT).await
}

/// Serves `ctx` on `listener` until `shutdown` fires and in-flight requests
/// finish, or `drain` elapses after the signal.
pub async fn run(
    listener: TcpListener,
    ctx: Arc<AppContext>,
    shutdown: ShutdownSignal,
    drain: Duration,
) -> ServerResult<()> {
    let server = axum::serve(listener, routes::router(ctx))
        .with_graceful_shutdown(shutdown.clone().wait())
        .into_future();
    let deadline = async {
        shutdown.wait().await;
        tokio::time::sleep(drain).await;
    };

    tokio::select! {
        result = server => result?,
        _ = deadline => warn!(drain_secs = drain.as_secs(), "in-flight requests did not finish, stopping anyway"),
    }

    info!("server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::handler::tests::{Fixture, waiting_fixture};
    use crate::signals::SignalHandler;
    use crate::telegram::TelegramConfig;

    #[tokio::test]
    async fn shutdown_ends_request_waiting_for_authorization() {
        let signals = SignalHandler::new();
        let Fixture {
            _dir,
            handler,
            coordinator,
            calendar,
            mut messages,
        } = waiting_fixture(signals.shutdown().receiver());
        let telegram = TelegramClient::new(
            TelegramConfig::new("123:abc", 42).with_api_base("http://127.0.0.1:9"),
        )
        .unwrap();
        let ctx = Arc::new(AppContext::new(handler, Arc::clone(&coordinator), telegram));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(run(
            listener,
            ctx,
            signals.shutdown(),
            Duration::from_secs(30),
        ));

        let request = tokio::spawn(
            reqwest::Client::new()
                .post(format!("http://{addr}/123:abc"))
                .json(&serde_json::json!({
                    "update_id": 1,
                    "message": {"chat": {"id": 42}, "text": "Dentist tomorrow 3pm"}
                }))
                .send(),
        );

        let prompt = messages.recv().await.unwrap();
        assert!(prompt.starts_with("Create new token:\n"));

        signals.trigger_shutdown();

        let stopped = tokio::time::timeout(Duration::from_secs(3), server).await;
        assert!(stopped.is_ok(), "server kept running after shutdown");
        stopped.unwrap().unwrap().unwrap();

        let response = request.await.unwrap().unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let reply = messages.recv().await.unwrap();
        assert!(reply.starts_with("[Google Calendar]: Authorization failed: "));
        assert!(reply.contains("cancelled"));
        assert!(coordinator.flag().is_set());
        assert!(calendar.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn drain_limit_stops_server() {
        let signals = SignalHandler::new();
        // the coordinator never sees the signal, so only the drain limit applies
        let (_never, unrelated) = tokio::sync::watch::channel(false);
        let Fixture {
            _dir,
            handler,
            coordinator,
            mut messages,
            ..
        } = waiting_fixture(unrelated);
        let telegram = TelegramClient::new(
            TelegramConfig::new("123:abc", 42).with_api_base("http://127.0.0.1:9"),
        )
        .unwrap();
        let ctx = Arc::new(AppContext::new(handler, coordinator, telegram));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(run(
            listener,
            ctx,
            signals.shutdown(),
            Duration::from_millis(100),
        ));

        let _request = tokio::spawn(
            reqwest::Client::new()
                .post(format!("http://{addr}/123:abc"))
                .json(&serde_json::json!({
                    "update_id": 2,
                    "message": {"chat": {"id": 42}, "text": "Dentist"}
                }))
                .send(),
        );
        messages.recv().await.unwrap();

        signals.trigger_shutdown();

        let stopped = tokio::time::timeout(Duration::from_secs(3), server).await;
        assert!(stopped.is_ok(), "server kept running past the drain limit");
    }
}
