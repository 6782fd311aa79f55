//! Calendar event model.
//!
//! [`Event`] is the provider-agnostic view of a calendar entry. Start and end
//! are zone-qualified timestamps ([`chrono_tz::Tz`]), so an event cannot be
//! built from a bare UTC offset.

use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;
use serde::Serialize;

/// A calendar event.
///
/// Two events are equal when their summary and start instant match. `end` and
/// `description` do not take part in equality.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Title shown in the calendar.
    pub summary: String,
    /// Start time in the event's zone.
    pub start: DateTime<Tz>,
    /// End time in the event's zone.
    pub end: DateTime<Tz>,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Event {
    /// Creates an event without a description.
    pub fn new(summary: impl Into<String>, start: DateTime<Tz>, end: DateTime<Tz>) -> Self {
        Self {
            summary: summary.into(),
            start,
            end,
            description: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Length of the event.
    pub fn duration(&self) -> TimeDelta {
        self.end.signed_duration_since(self.start)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.summary == other.summary && self.start == other.start
    }
}

impl Eq for Event {}
