use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ConversionError;
use crate::time::CalTime;

/// Identity of an event definition, assigned in parse order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub(crate) usize);

/// One concrete start of an event definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub source: EventId,
    pub start: DateTime<Utc>,
}

/// The public record returned for every selected event definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripEvent {
    #[serde(rename = "EventTitel")]
    pub title: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "EventStart")]
    pub start: DateTime<Utc>,
    #[serde(rename = "EventEnd")]
    pub end: DateTime<Utc>,
    #[serde(rename = "Description")]
    pub description: String,
}

/// Every event definition found in a feed.
#[derive(Debug, Clone, Default)]
pub struct Calendar {
    pub events: Vec<EventDefinition>,
}

impl Calendar {
    pub fn get(&self, id: EventId) -> Option<&EventDefinition> {
        self.events.get(id.0)
    }
}

/// A VEVENT as declared in the feed, before any expansion.
#[derive(Debug, Clone)]
pub struct EventDefinition {
    pub id: EventId,
    pub uid: Option<String>,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub start: CalTime,
    pub end: EventEnd,
    pub recurrence: Recurrence,
    /// Set when this definition replaces one instance of a recurring series.
    pub recurrence_id: Option<CalTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventEnd {
    At(CalTime),
    After(TimeDelta),
    Unspecified,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recurrence {
    pub rule: Option<String>,
    pub rdates: Vec<CalTime>,
    pub exdates: Vec<CalTime>,
}

impl EventDefinition {
    pub fn start_utc(&self, reference: Tz) -> Result<DateTime<Utc>, ConversionError> {
        self.start.to_utc(reference)
    }

    /// DTEND, else DTSTART + DURATION, else one day for all-day events, else DTSTART.
    pub fn end_utc(&self, reference: Tz) -> Result<DateTime<Utc>, ConversionError> {
        match &self.end {
            EventEnd::At(end) => end.to_utc(reference),
            EventEnd::After(duration) => Ok(self.start_utc(reference)? + *duration),
            EventEnd::Unspecified if self.start.is_date() => {
                Ok(self.start_utc(reference)? + TimeDelta::days(1))
            }
            EventEnd::Unspecified => self.start_utc(reference),
        }
    }
}
