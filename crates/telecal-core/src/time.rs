//! Time handling for calendar events.
//!
//! [`EventClock`] resolves "now" in the configured IANA zone. It produces the
//! start of the default event and the current time embedded in extraction
//! prompts. [`parse_timestamp`] is the single RFC 3339 entry point.

use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use chrono_tz::Tz;

/// Parses an RFC 3339 timestamp carrying an explicit UTC offset.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value.trim())
}

/// A clock bound to an IANA time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventClock {
    zone: Tz,
}

impl EventClock {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    /// Builds a clock from a zone name such as `Asia/Shanghai`.
    ///
    /// Returns `None` for names unknown to the tz database.
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse::<Tz>().ok().map(Self::new)
    }

    /// The zone name, as sent in the provider's `timeZone` field.
    pub fn zone_name(&self) -> &'static str {
        self.zone.name()
    }

    /// The current time in this zone, truncated to whole seconds.
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.at(Utc::now())
    }

    /// Converts an instant into this zone, truncated to whole seconds.
    pub fn at(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant
            .with_timezone(&self.zone)
            .fixed_offset()
            .trunc_subsecs(0)
    }
}

impl Default for EventClock {
    fn default() -> Self {
        Self::new(chrono_tz::Asia::Shanghai)
    }
}
