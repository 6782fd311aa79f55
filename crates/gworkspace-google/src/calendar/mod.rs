//! Google Calendar access.
//!
//! [`GoogleCalendarClient`] speaks the REST API; [`EventManager`] works on one
//! calendar in terms of [`gworkspace_core::Event`].
//!
//! # Example
//!
//! ```ignore
//! use gworkspace_google::calendar::{CALENDAR_SCOPES, EventManager, GoogleCalendarClient};
//!
//! let credentials = provider.create()?;
//! let client = GoogleCalendarClient::new(config.transport()?, &credentials)?;
//! let events = EventManager::new(client, "primary");
//! for event in events.iterate_future_events(chrono::Utc::now()).take(5) {
//!     println!("{}", event?.summary);
//! }
//! ```

mod client;
mod manager;

pub use client::{
    ApiEvent, CALENDAR_API_BASE, CalendarApi, EventDateTime, EventQuery, GoogleCalendarClient,
};
pub use manager::EventManager;

/// Scopes required by [`GoogleCalendarClient`].
pub const CALENDAR_SCOPES: &[&str] = &["https://www.googleapis.com/auth/calendar"];
