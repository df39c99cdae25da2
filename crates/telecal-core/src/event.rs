//! Event types for calendar entries.
//!
//! This module provides the two shapes an event goes through:
//! - [`EventDraft`]: loosely structured fields extracted from free text,
//!   every one of them optional
//! - [`CalendarEvent`]: the fully populated record sent to the calendar
//!   provider, serialized in the provider's wire shape
//!
//! [`EventLink`] is what the provider hands back after an insert.

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::parse_timestamp;

/// Maximum number of reminder overrides a calendar event can carry.
pub const MAX_REMINDERS: usize = 5;

/// Summary used when the draft does not provide one.
pub const DEFAULT_SUMMARY: &str = "Unknown";

/// Errors raised while decoding a draft from model output.
#[derive(Debug, Error)]
pub enum DraftError {
    /// The payload is not a JSON object with the expected field types.
    #[error("invalid draft payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A start or end value is not an RFC 3339 timestamp.
    #[error("invalid {field} timestamp {value:?}: {source}")]
    InvalidTimestamp {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A reminder value is not a non-negative integer number of minutes.
    #[error("invalid reminder value: {0}")]
    InvalidReminder(serde_json::Value),
}

/// Event fields extracted from a chat message.
///
/// Empty strings are normalized to `None` while decoding, so "absent" and
/// "empty" are indistinguishable once a draft exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDraft {
    pub summary: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub reminder_minutes: Option<Vec<u32>>,
}

/// The draft as it arrives on the wire, before typing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDraft {
    summary: Option<String>,
    location: Option<String>,
    description: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    reminder_minutes: Option<Vec<serde_json::Value>>,
}

impl EventDraft {
    /// Decodes a draft from the JSON text returned by the extraction model.
    pub fn from_json(json: &str) -> Result<Self, DraftError> {
        let raw: RawDraft = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Returns true if no field carries a value.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn from_raw(raw: RawDraft) -> Result<Self, DraftError> {
        let reminder_minutes = raw
            .reminder_minutes
            .map(|values| values.into_iter().map(reminder_minutes).collect())
            .transpose()?;

        Ok(Self {
            summary: non_empty(raw.summary),
            location: non_empty(raw.location),
            description: non_empty(raw.description),
            start_time: timestamp("start_time", raw.start_time)?,
            end_time: timestamp("end_time", raw.end_time)?,
            reminder_minutes,
        })
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn timestamp(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<DateTime<FixedOffset>>, DraftError> {
    match non_empty(value) {
        None => Ok(None),
        Some(value) => parse_timestamp(&value)
            .map(Some)
            .map_err(|source| DraftError::InvalidTimestamp {
                field,
                value,
                source,
            }),
    }
}

/// Accepts JSON integers and integer strings, rejects anything negative.
fn reminder_minutes(value: serde_json::Value) -> Result<u32, DraftError> {
    let parsed = match &value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|m| u32::try_from(m).ok()),
        serde_json::Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    parsed.ok_or(DraftError::InvalidReminder(value))
}

/// A point in time together with the IANA zone the provider should display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: DateTime<FixedOffset>,
    pub time_zone: String,
}

impl EventDateTime {
    pub fn new(date_time: DateTime<FixedOffset>, time_zone: impl Into<String>) -> Self {
        Self {
            date_time,
            time_zone: time_zone.into(),
        }
    }
}

/// An event attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attendee {
    pub email: String,
}

/// How the provider delivers a reminder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderMethod {
    #[default]
    Popup,
}

/// A single reminder override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub method: ReminderMethod,
    pub minutes: u32,
}

impl Reminder {
    /// Creates a popup reminder firing `minutes` before the event.
    pub fn popup(minutes: u32) -> Self {
        Self {
            method: ReminderMethod::Popup,
            minutes,
        }
    }
}

/// Reminder settings of an event.
///
/// The override list never holds more than [`MAX_REMINDERS`] entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    use_default: bool,
    overrides: Vec<Reminder>,
}

impl Reminders {
    /// Appends a reminder if there is room left.
    ///
    /// Returns false, leaving the list untouched, once the list is full.
    pub fn try_push(&mut self, reminder: Reminder) -> bool {
        if self.is_full() {
            return false;
        }
        self.overrides.push(reminder);
        true
    }

    /// Returns the reminder overrides in insertion order.
    pub fn overrides(&self) -> &[Reminder] {
        &self.overrides
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.overrides.len() >= MAX_REMINDERS
    }

    /// Whether the calendar's default reminders apply. Always false here,
    /// overrides are the only reminders sent.
    pub fn use_default(&self) -> bool {
        self.use_default
    }
}

/// A fully populated calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    pub attendees: Vec<Attendee>,
    pub reminders: Reminders,
}

impl CalendarEvent {
    /// Builds the default event used as merge base.
    ///
    /// The event starts at `start`, lasts one hour, invites `attendee` and
    /// has no reminders.
    pub fn template(
        start: DateTime<FixedOffset>,
        time_zone: &str,
        attendee: impl Into<String>,
    ) -> Self {
        Self {
            summary: DEFAULT_SUMMARY.to_string(),
            location: String::new(),
            description: String::new(),
            start: EventDateTime::new(start, time_zone),
            end: EventDateTime::new(start + Duration::hours(1), time_zone),
            attendees: vec![Attendee {
                email: attendee.into(),
            }],
            reminders: Reminders::default(),
        }
    }

    /// Serializes the event into the calendar provider's JSON body.
    pub fn to_json(&self) -> serde_json::Value {
        // Serializing plain strings, integers and chrono timestamps cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// A link to an event created by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLink {
    /// Provider-assigned event identifier.
    pub id: Option<String>,
    /// URL of the event in the provider's web UI.
    pub html_link: String,
}

impl std::fmt::Display for EventLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.html_link)
    }
}
