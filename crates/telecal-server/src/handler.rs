//! Webhook update handling.
//!
//! One text message runs the whole pipeline: extraction, merge into the
//! default event, credential acquisition, calendar insert, and a reply in
//! the chat. Nothing here fails the webhook request; failures are logged
//! with their stage and, where the user should know, reported in the chat.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use telecal_core::{CalendarEvent, EventClock, EventLink, merge};
use telecal_providers::{AuthorizationCoordinator, CalendarProvider, Notifier};

use crate::extract::EventExtractor;
use crate::telegram::Update;

/// Why an update produced no calendar work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The update carries no `message`.
    NoMessage,
    /// A bot sent the message.
    FromBot,
    /// The message came from a chat other than the configured one.
    ForeignChat,
    /// The message has no text.
    NoText,
    /// Extraction or draft decoding failed.
    Extraction,
    /// Telegram redelivered an update that is already being handled.
    Duplicate,
}

/// Result of handling one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The event was created.
    Created(EventLink),
    /// Credential or insert failure; the message was sent to the chat.
    Failed(String),
    Dropped(DropReason),
}

/// Runs incoming messages through the event pipeline.
pub struct RequestHandler {
    extractor: Arc<dyn EventExtractor>,
    coordinator: Arc<AuthorizationCoordinator>,
    calendar: Arc<dyn CalendarProvider>,
    notifier: Arc<dyn Notifier>,
    template: CalendarEvent,
    clock: EventClock,
    chat_id: i64,
    recent: Mutex<RecentUpdates>,
}

/// Update ids seen lately, oldest first.
#[derive(Debug, Default)]
struct RecentUpdates {
    ids: VecDeque<i64>,
}

impl RecentUpdates {
    const CAPACITY: usize = 128;

    /// Records `id`; returns false if it was already recorded.
    fn insert(&mut self, id: i64) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        if self.ids.len() == Self::CAPACITY {
            self.ids.pop_front();
        }
        self.ids.push_back(id);
        true
    }
}

impl RequestHandler {
    pub fn new(
        extractor: Arc<dyn EventExtractor>,
        coordinator: Arc<AuthorizationCoordinator>,
        calendar: Arc<dyn CalendarProvider>,
        notifier: Arc<dyn Notifier>,
        template: CalendarEvent,
        clock: EventClock,
        chat_id: i64,
    ) -> Self {
        Self {
            extractor,
            coordinator,
            calendar,
            notifier,
            template,
            clock,
            chat_id,
            recent: Mutex::new(RecentUpdates::default()),
        }
    }

    /// The default event drafts are merged into.
    pub fn template(&self) -> &CalendarEvent {
        &self.template
    }

    /// Handles a webhook update.
    ///
    /// Telegram redelivers updates that were not acknowledged in time, which
    /// happens while a request waits for authorization. Redeliveries of an
    /// update id seen recently are dropped.
    pub async fn handle_update(&self, update: Update) -> HandleOutcome {
        if let Some(id) = update.update_id
            && !self.recent.lock().await.insert(id)
        {
            debug!(update_id = id, "ignoring redelivered update");
            return HandleOutcome::Dropped(DropReason::Duplicate);
        }
        let Some(message) = update.message else {
            return HandleOutcome::Dropped(DropReason::NoMessage);
        };
        if message.from_bot() {
            return HandleOutcome::Dropped(DropReason::FromBot);
        }
        if message.chat.id != self.chat_id {
            warn!(chat_id = message.chat.id, "ignoring message from unknown chat");
            return HandleOutcome::Dropped(DropReason::ForeignChat);
        }
        match message.text {
            Some(text) if !text.trim().is_empty() => self.handle_text(&text).await,
            _ => HandleOutcome::Dropped(DropReason::NoText),
        }
    }

    /// Creates an event from `text` and reports the result in the chat.
    pub async fn handle_text(&self, text: &str) -> HandleOutcome {
        info!(text, "received message");

        let draft = match self.extractor.extract(text, self.clock.now()).await {
            Ok(draft) => draft,
            Err(e) => {
                error!(stage = e.stage(), error = %e, "could not build event from message");
                return HandleOutcome::Dropped(DropReason::Extraction);
            }
        };

        let event = merge(draft, &self.template);
        info!(
            stage = "merge",
            summary = %event.summary,
            start = %event.start.date_time,
            reminders = event.reminders.len(),
            "event ready"
        );

        let credential = match self.coordinator.ensure_credential().await {
            Ok(credential) => credential,
            Err(e) => {
                error!(stage = "authorization", error = %e, "no usable credential");
                return self
                    .fail(format!("[Google Calendar]: Authorization failed: {}", e))
                    .await;
            }
        };

        match self.calendar.insert_event(&event, &credential).await {
            Ok(link) => {
                info!(stage = "calendar", link = %link, "event created");
                self.notifier
                    .notify(&format!("Event created: {}", link))
                    .await;
                HandleOutcome::Created(link)
            }
            Err(e) => {
                error!(stage = "calendar", provider = self.calendar.name(), error = %e, "insert failed");
                self.fail(format!("[Google Calendar]: An error occurred: {}", e))
                    .await
            }
        }
    }

    async fn fail(&self, message: String) -> HandleOutcome {
        self.notifier.notify(&message).await;
        HandleOutcome::Failed(message)
    }
}
