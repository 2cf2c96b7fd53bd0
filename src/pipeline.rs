//! Selection of current-year events from a parsed calendar.
//!
//! A run goes through three steps:
//!
//! 1. [`select`] expands every definition into occurrences starting on or after
//!    January 1 of the current year in the reference zone.
//! 2. [`dedup`] reduces occurrences to the definitions they came from.
//! 3. [`normalize`] projects each definition to a [`TripEvent`] in UTC.
//!
//! A recurring definition reports its own DTSTART/DTEND, not the instance that
//! placed it in the window.
//!
//! The current year is the one `now` falls in as seen from the reference zone,
//! not from UTC. Between 23:00 and 24:00 UTC on December 31 the window in
//! Europe/Berlin therefore already starts at the following January 1.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::error::Result;
use crate::recurrence::Expansion;
use crate::structs::{Calendar, EventId, Occurrence, TripEvent};
use crate::time::year_start;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Zone the year boundary and all-day dates are anchored to.
    pub reference: Tz,
    pub max_occurrences: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reference: chrono_tz::Europe::Berlin,
            max_occurrences: 1000,
        }
    }
}

impl Config {
    fn expansion(&self) -> Expansion {
        Expansion {
            reference: self.reference,
            limit: self.max_occurrences,
        }
    }
}

pub fn select(calendar: &Calendar, now: DateTime<Utc>, config: &Config) -> Result<Vec<Occurrence>> {
    let window_start = year_start(now, config.reference)?;
    debug!(%window_start, "Selecting occurrences");

    calendar.occurrences_from(window_start, &config.expansion())
}

/// Distinct source definitions in order of first appearance.
pub fn dedup(occurrences: &[Occurrence]) -> Vec<EventId> {
    let mut seen = HashSet::new();

    occurrences
        .iter()
        .map(|occurrence| occurrence.source)
        .filter(|id| seen.insert(*id))
        .collect()
}

pub fn normalize(calendar: &Calendar, ids: &[EventId], config: &Config) -> Result<Vec<TripEvent>> {
    let mut trips = Vec::with_capacity(ids.len());

    for event in ids.iter().filter_map(|id| calendar.get(*id)) {
        trips.push(TripEvent {
            title: event.summary.clone().unwrap_or_default(),
            location: event.location.clone().unwrap_or_default(),
            description: event.description.clone().unwrap_or_default(),
            start: event.start_utc(config.reference)?,
            end: event.end_utc(config.reference)?,
        });
    }

    Ok(trips)
}

pub fn trip_events(calendar: &Calendar, now: DateTime<Utc>, config: &Config) -> Result<Vec<TripEvent>> {
    let occurrences = select(calendar, now, config)?;
    let ids = dedup(&occurrences);

    debug!(
        occurrences = occurrences.len(),
        events = ids.len(),
        "Deduplicated occurrences"
    );

    normalize(calendar, &ids, config)
}
