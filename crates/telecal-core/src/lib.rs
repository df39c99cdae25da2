//! Core types: event drafts, calendar events, merging, time, tracing

pub mod event;
pub mod merge;
pub mod time;
pub mod tracing;

pub use event::{
    Attendee, CalendarEvent, DEFAULT_SUMMARY, DraftError, EventDateTime, EventDraft, EventLink,
    MAX_REMINDERS, Reminder, ReminderMethod, Reminders,
};
pub use merge::merge;
pub use time::{EventClock, parse_timestamp};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
