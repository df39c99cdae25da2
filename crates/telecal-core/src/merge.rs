//! Merging extracted drafts into calendar events.

use tracing::debug;

use crate::event::{CalendarEvent, EventDraft, Reminder, non_empty};

/// Merges a draft into a copy of `template`.
///
/// Scalar fields are replaced only when the draft carries a non-empty value.
/// Reminder minutes are appended in order as popup overrides until the event
/// holds the maximum number of reminders; extra values are dropped.
/// The template itself is left untouched.
pub fn merge(draft: EventDraft, template: &CalendarEvent) -> CalendarEvent {
    let mut event = template.clone();

    if let Some(summary) = non_empty(draft.summary) {
        debug!(stage = "merge", field = "summary", value = %summary, "replacing field");
        event.summary = summary;
    }
    if let Some(location) = non_empty(draft.location) {
        debug!(stage = "merge", field = "location", value = %location, "replacing field");
        event.location = location;
    }
    if let Some(description) = non_empty(draft.description) {
        debug!(stage = "merge", field = "description", "replacing field");
        event.description = description;
    }
    if let Some(start) = draft.start_time {
        debug!(stage = "merge", field = "start", value = %start, "replacing field");
        event.start.date_time = start;
    }
    if let Some(end) = draft.end_time {
        debug!(stage = "merge", field = "end", value = %end, "replacing field");
        event.end.date_time = end;
    }

    if let Some(minutes) = draft.reminder_minutes {
        let requested = minutes.len();
        let mut added = 0usize;
        for m in minutes {
            if !event.reminders.try_push(Reminder::popup(m)) {
                break;
            }
            added += 1;
        }
        if added < requested {
            debug!(
                stage = "merge",
                requested,
                added,
                "reminder limit reached, dropping the rest"
            );
        }
    }

    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{MAX_REMINDERS, ReminderMethod};
    use chrono::{DateTime, FixedOffset};

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn template() -> CalendarEvent {
        CalendarEvent::template(
            ts("2025-01-01T09:00:00+08:00"),
            "Asia/Shanghai",
            "me@example.com",
        )
    }

    #[test]
    fn test_merge_dentist() {
        let template = template();
        let draft = EventDraft::from_json(
            r#"{
                "summary": "Dentist",
                "start_time": "2025-05-11T15:00:00+08:00",
                "reminder_minutes": [60, 120, 1440, 2880, 10080, 20160]
            }"#,
        )
        .unwrap();

        let event = merge(draft, &template);

        assert_eq!(event.summary, "Dentist");
        assert_eq!(event.start.date_time, ts("2025-05-11T15:00:00+08:00"));
        assert_eq!(event.start.time_zone, "Asia/Shanghai");
        // end keeps the template value even if it now precedes start
        assert_eq!(event.end, template.end);
        assert_eq!(event.location, "");
        assert_eq!(event.attendees, template.attendees);

        let minutes: Vec<u32> = event.reminders.overrides().iter().map(|r| r.minutes).collect();
        assert_eq!(minutes, vec![60, 120, 1440, 2880, 10080]);
        assert!(
            event
                .reminders
                .overrides()
                .iter()
                .all(|r| r.method == ReminderMethod::Popup)
        );
    }

    #[test]
    fn test_merge_empty_draft_is_identity() {
        let template = template();
        let event = merge(EventDraft::default(), &template);
        assert_eq!(event, template);
    }

    #[test]
    fn test_merge_empty_summary_keeps_default() {
        let template = template();
        let draft = EventDraft::from_json(r#"{"summary": "", "location": "Cafe"}"#).unwrap();
        let event = merge(draft, &template);
        assert_eq!(event.summary, "Unknown");
        assert_eq!(event.location, "Cafe");
    }

    #[test]
    fn test_merge_built_draft_with_empty_strings() {
        let template = template();
        let draft = EventDraft {
            summary: Some(String::new()),
            location: Some(String::new()),
            description: Some(String::new()),
            ..Default::default()
        };

        let event = merge(draft, &template);

        assert_eq!(event.summary, "Unknown");
        assert_eq!(event, template);
    }

    #[test]
    fn test_merge_does_not_mutate_template() {
        let template = template();
        let snapshot = template.clone();
        let draft = EventDraft {
            summary: Some("Standup".into()),
            reminder_minutes: Some(vec![5, 10]),
            ..Default::default()
        };

        let first = merge(draft.clone(), &template);
        let second = merge(draft, &template);

        assert_eq!(template, snapshot);
        assert_eq!(first, second);
        assert_eq!(first.reminders.len(), 2);
    }

    #[test]
    fn test_merge_reminders_never_exceed_limit() {
        let template = template();
        let draft = EventDraft {
            reminder_minutes: Some((1..=12).collect()),
            ..Default::default()
        };
        let event = merge(draft, &template);
        assert_eq!(event.reminders.len(), MAX_REMINDERS);
        assert_eq!(event.reminders.overrides()[0].minutes, 1);
        assert_eq!(event.reminders.overrides()[4].minutes, 5);
    }

    #[test]
    fn test_merge_all_fields() {
        let template = template();
        let draft = EventDraft {
            summary: Some("Flight".into()),
            location: Some("PVG".into()),
            description: Some("Gate 12".into()),
            start_time: Some(ts("2025-06-01T08:00:00+08:00")),
            end_time: Some(ts("2025-06-01T11:30:00+09:00")),
            reminder_minutes: Some(vec![]),
        };
        let event = merge(draft, &template);

        assert_eq!(event.summary, "Flight");
        assert_eq!(event.location, "PVG");
        assert_eq!(event.description, "Gate 12");
        assert_eq!(event.end.date_time, ts("2025-06-01T11:30:00+09:00"));
        assert!(event.reminders.is_empty());
    }

    #[test]
    fn test_merged_event_wire_json() {
        let draft = EventDraft::from_json(
            r#"{"summary": "Dentist", "start_time": "2025-05-11T15:00:00+08:00", "reminder_minutes": [60, 1440]}"#,
        )
        .unwrap();
        let event = merge(draft, &template());

        insta::assert_json_snapshot!(event.to_json(), @r#"
        {
          "attendees": [
            {
              "email": "me@example.com"
            }
          ],
          "description": "",
          "end": {
            "dateTime": "2025-01-01T10:00:00+08:00",
            "timeZone": "Asia/Shanghai"
          },
          "location": "",
          "reminders": {
            "overrides": [
              {
                "method": "popup",
                "minutes": 60
              },
              {
                "method": "popup",
                "minutes": 1440
              }
            ],
            "useDefault": false
          },
          "start": {
            "dateTime": "2025-05-11T15:00:00+08:00",
            "timeZone": "Asia/Shanghai"
          },
          "summary": "Dentist"
        }
        "#);
    }
}
