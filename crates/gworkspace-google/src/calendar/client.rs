//! Google Calendar API v3 client.
//!
//! Wire types mirror the event resource fields this crate reads and writes;
//! conversion to and from [`Event`] happens at this boundary.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use gworkspace_core::Event;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::auth::Credentials;
use crate::error::{ProviderError, ProviderResult};
use crate::pagination::{ListResponse, Page};
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Parameters of an `events.list` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Lower bound (exclusive) for an event's end time.
    pub time_min: Option<DateTime<Utc>>,
    /// Expand recurring events into instances.
    pub single_events: bool,
    /// Order by start time; only valid together with `single_events`.
    pub order_by_start_time: bool,
    /// Page size.
    pub max_results: Option<u32>,
}

impl EventQuery {
    /// Single events starting from `now`, ordered by start time.
    ///
    /// `now` is truncated to whole seconds.
    pub fn upcoming(now: DateTime<Utc>) -> Self {
        Self {
            time_min: Some(truncate_to_seconds(now)),
            single_events: true,
            order_by_start_time: true,
            max_results: None,
        }
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_max_results(mut self, max: u32) -> Self {
        self.max_results = Some(max);
        self
    }

    fn apply(&self, mut request: HttpRequest) -> HttpRequest {
        if let Some(time_min) = self.time_min {
            request = request.query("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        if self.single_events {
            request = request.query("singleEvents", "true");
        }
        if self.order_by_start_time {
            request = request.query("orderBy", "startTime");
        }
        if let Some(max) = self.max_results {
            request = request.query("maxResults", max.to_string());
        }
        request
    }
}

fn truncate_to_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(t.timestamp(), 0).unwrap_or(t)
}

/// Start or end of an event on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    /// RFC 3339 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// `yyyy-mm-dd`, set instead of `date_time` for all-day events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// IANA zone name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    /// Encodes a zoned timestamp at second precision.
    pub fn from_datetime(value: &DateTime<Tz>) -> Self {
        Self {
            date_time: Some(value.to_rfc3339_opts(SecondsFormat::Secs, false)),
            date: None,
            time_zone: Some(value.timezone().name().to_string()),
        }
    }

    /// Decodes into the zone named by `time_zone`, or UTC when absent.
    pub fn to_datetime(&self) -> ProviderResult<DateTime<Tz>> {
        let Some(date_time) = self.date_time.as_deref() else {
            return Err(ProviderError::invalid_response(match self.date {
                Some(ref date) => format!("all-day event on {date} has no dateTime"),
                None => "event time has neither dateTime nor date".to_string(),
            }));
        };

        let zone = match self.time_zone.as_deref() {
            Some(name) => name.parse::<Tz>().map_err(|e| {
                ProviderError::invalid_response(format!("unknown time zone {name:?}: {e}"))
            })?,
            None => Tz::UTC,
        };

        let parsed = DateTime::parse_from_rfc3339(date_time).map_err(|e| {
            ProviderError::invalid_response(format!("invalid dateTime {date_time:?}: {e}"))
                .with_source(e)
        })?;
        Ok(parsed.with_timezone(&zone))
    }
}

/// An event resource, restricted to the fields this crate uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    /// Server-assigned id; absent on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: EventDateTime,
    pub end: EventDateTime,
}

impl From<&Event> for ApiEvent {
    fn from(event: &Event) -> Self {
        Self {
            id: None,
            summary: event.summary.clone(),
            description: event.description.clone().filter(|d| !d.is_empty()),
            start: EventDateTime::from_datetime(&event.start),
            end: EventDateTime::from_datetime(&event.end),
        }
    }
}

impl TryFrom<ApiEvent> for Event {
    type Error = ProviderError;

    fn try_from(api: ApiEvent) -> ProviderResult<Self> {
        let mut event = Event::new(api.summary, api.start.to_datetime()?, api.end.to_datetime()?);
        event.description = api.description;
        Ok(event)
    }
}

/// Event operations on one Google account.
pub trait CalendarApi {
    /// Fetches one page of `calendar_id`'s events.
    fn list_events(
        &self,
        calendar_id: &str,
        query: &EventQuery,
        page_token: Option<&str>,
    ) -> ProviderResult<Page<ApiEvent>>;

    /// Creates an event and returns the stored resource.
    fn insert_event(&self, calendar_id: &str, event: &ApiEvent) -> ProviderResult<ApiEvent>;
}

/// [`CalendarApi`] over the REST endpoints.
#[derive(Clone)]
pub struct GoogleCalendarClient {
    transport: Arc<dyn Transport>,
    access_token: String,
    base_url: String,
}

impl GoogleCalendarClient {
    /// Creates a client authorized by `credentials`.
    pub fn new(transport: Arc<dyn Transport>, credentials: &Credentials) -> ProviderResult<Self> {
        let access_token = credentials
            .bearer()
            .ok_or_else(|| ProviderError::authentication("credentials carry no access token"))?;
        Ok(Self {
            transport,
            access_token: access_token.to_string(),
            base_url: CALENDAR_API_BASE.to_string(),
        })
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    fn send(&self, request: HttpRequest) -> ProviderResult<HttpResponse> {
        self.transport
            .execute(request.bearer(&self.access_token))
            .and_then(HttpResponse::error_for_status)
            .inspect_err(|e| error!("calendar request failed: {}", e))
    }
}

impl CalendarApi for GoogleCalendarClient {
    fn list_events(
        &self,
        calendar_id: &str,
        query: &EventQuery,
        page_token: Option<&str>,
    ) -> ProviderResult<Page<ApiEvent>> {
        let mut request = query.apply(HttpRequest::get(self.events_url(calendar_id)));
        if let Some(token) = page_token {
            request = request.query("pageToken", token);
        }

        let page: Page<ApiEvent> = self.send(request)?.json::<ListResponse<ApiEvent>>()?.into();
        debug!(
            "fetched {} events from calendar {}",
            page.items.len(),
            calendar_id
        );
        Ok(page)
    }

    fn insert_event(&self, calendar_id: &str, event: &ApiEvent) -> ProviderResult<ApiEvent> {
        let body = serde_json::to_value(event).map_err(|e| {
            ProviderError::internal(format!("failed to serialize event: {e}")).with_source(e)
        })?;
        let created: ApiEvent = self
            .send(HttpRequest::post(self.events_url(calendar_id)).json(body))?
            .json()?;
        debug!("inserted event {:?} into calendar {}", created.id, calendar_id);
        Ok(created)
    }
}
