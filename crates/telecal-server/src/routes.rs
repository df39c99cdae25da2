//! HTTP routes.
//!
//! - `GET /` health page
//! - `POST /{bot_token}` Telegram webhook
//! - `GET /auth/start` authorization URL of the pending session
//! - `GET /auth/callback` OAuth redirect target

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::app::AppContext;
use crate::handler::HandleOutcome;
use crate::telegram::Update;

/// Builds the application router.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/auth/start", get(auth_start))
        .route("/auth/callback", get(auth_callback))
        .route("/{token}", post(webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn index() -> Html<&'static str> {
    Html("<h1>Telegram Google Calendar bot is running.</h1>")
}

async fn webhook(
    State(ctx): State<Arc<AppContext>>,
    Path(token): Path<String>,
    Json(update): Json<Update>,
) -> Response {
    if !ctx.telegram.is_bot_token(&token) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let chat_id = update.message.as_ref().map(|m| m.chat.id);
    let span = info_span!(
        "update",
        request_id = %Uuid::new_v4(),
        update_id = ?update.update_id,
        chat_id = ?chat_id
    );

    let outcome = ctx.handler.handle_update(update).instrument(span).await;
    if let HandleOutcome::Dropped(reason) = outcome {
        debug!(?reason, "update dropped");
    }

    Json(serde_json::json!({ "ok": true })).into_response()
}

async fn auth_start(State(ctx): State<Arc<AppContext>>) -> Response {
    match ctx.coordinator.begin_authorization() {
        Ok(url) => Json(serde_json::json!({ "auth_url": url })).into_response(),
        Err(e) => {
            error!(stage = "authorization", error = %e, "could not start authorization");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn auth_callback(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(denied) = params.get("error") {
        warn!(stage = "authorization", error = %denied, "authorization denied");
        return (
            StatusCode::BAD_REQUEST,
            format!("Authorization failed: {}", denied),
        )
            .into_response();
    }

    let (Some(code), Some(state)) = (params.get("code"), params.get("state")) else {
        return (
            StatusCode::BAD_REQUEST,
            "Authorization failed: missing code or state",
        )
            .into_response();
    };

    match ctx.callback.complete(code, state).await {
        Ok(()) => {
            info!(stage = "authorization", "authorization callback completed");
            "Authorization completed. You can return to the app.".into_response()
        }
        Err(e) => {
            error!(stage = "authorization", error = %e, "authorization callback failed");
            (StatusCode::BAD_REQUEST, format!("Authorization failed: {}", e)).into_response()
        }
    }
}
