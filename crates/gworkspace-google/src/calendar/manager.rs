//! Event operations on one calendar.

use chrono::{DateTime, Utc};
use gworkspace_core::Event;
use tracing::debug;

use crate::error::ProviderResult;
use crate::pagination::Paginated;

use super::client::{ApiEvent, CalendarApi, EventQuery};

/// Registers and lists events of a single calendar.
pub struct EventManager<C> {
    api: C,
    calendar_id: String,
}

impl<C: CalendarApi> EventManager<C> {
    /// Creates a manager for `calendar_id` (`"primary"` for the user's own).
    pub fn new(api: C, calendar_id: impl Into<String>) -> Self {
        Self {
            api,
            calendar_id: calendar_id.into(),
        }
    }

    /// Returns the calendar id.
    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    /// Inserts `event` into the calendar.
    pub fn register(&self, event: &Event) -> ProviderResult<()> {
        self.api
            .insert_event(&self.calendar_id, &ApiEvent::from(event))?;
        debug!("registered event {:?} at {}", event.summary, event.start);
        Ok(())
    }

    /// Lazily yields single events from `now` on, ordered by start time.
    ///
    /// Pages are requested as the iterator is consumed.
    pub fn iterate_future_events(
        &self,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = ProviderResult<Event>> + '_ {
        let query = EventQuery::upcoming(now);
        Paginated::new(move |token: Option<&str>| {
            self.api.list_events(&self.calendar_id, &query, token)
        })
        .map(|item| item.and_then(Event::try_from))
    }

    /// Fetches at most `limit` upcoming events in a single request and logs
    /// them.
    pub fn check_upcoming(&self, now: DateTime<Utc>, limit: u32) -> ProviderResult<Vec<Event>> {
        debug!("Getting the upcoming {} events", limit);
        let query = EventQuery::upcoming(now).with_max_results(limit);
        let page = self.api.list_events(&self.calendar_id, &query, None)?;

        let events = page
            .items
            .into_iter()
            .map(Event::try_from)
            .collect::<ProviderResult<Vec<_>>>()?;
        if events.is_empty() {
            debug!("No upcoming events found.");
        }
        for event in &events {
            debug!("{} {}", event.start.to_rfc3339(), event.summary);
        }
        Ok(events)
    }
}
