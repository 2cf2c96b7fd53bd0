use std::str::FromStr;

use ical::parser::ical::component::IcalEvent;
use ical::parser::ical::IcalParser;
use ical::property::Property;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::structs::{Calendar, EventDefinition, EventEnd, EventId, Recurrence};
use crate::time::{parse_duration, CalTime};

/// Reads every VEVENT of every VCALENDAR in `s`.
pub fn parse_calendar<S: AsRef<str>>(s: S) -> Result<Calendar, ParseError> {
    let mut found_calendar = false;
    let mut events = Vec::new();

    for calendar in IcalParser::new(s.as_ref().as_bytes()) {
        let calendar = calendar.map_err(|err| ParseError::Malformed(err.to_string()))?;
        found_calendar = true;

        for event in &calendar.events {
            let id = EventId(events.len());
            if let Some(definition) = parse_event(event, id)? {
                events.push(definition);
            }
        }
    }

    if !found_calendar {
        return Err(ParseError::NoCalendar);
    }

    debug!(events = events.len(), "Parsed calendar");
    Ok(Calendar { events })
}

impl FromStr for Calendar {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_calendar(s)
    }
}

fn parse_event(event: &IcalEvent, id: EventId) -> Result<Option<EventDefinition>, ParseError> {
    let uid = text(event, "UID");

    let Some(start) = time(event, "DTSTART")? else {
        warn!(uid = ?uid, "Skipping event without DTSTART");
        return Ok(None);
    };

    let end = match (time(event, "DTEND")?, property(event, "DURATION")) {
        (Some(end), _) => EventEnd::At(end),
        (None, Some(duration)) => {
            let value = duration.value.as_deref().unwrap_or_default();
            let duration = parse_duration(value).ok_or_else(|| ParseError::InvalidValue {
                property: "DURATION",
                value: value.to_owned(),
            })?;
            EventEnd::After(duration)
        }
        (None, None) => EventEnd::Unspecified,
    };

    let recurrence = Recurrence {
        rule: property(event, "RRULE")
            .and_then(|rule| rule.value.as_deref())
            .map(|rule| rule.trim().to_owned()),
        rdates: time_list(event, "RDATE")?,
        exdates: time_list(event, "EXDATE")?,
    };

    Ok(Some(EventDefinition {
        id,
        summary: text(event, "SUMMARY"),
        location: text(event, "LOCATION"),
        description: text(event, "DESCRIPTION"),
        recurrence_id: time(event, "RECURRENCE-ID")?,
        uid,
        start,
        end,
        recurrence,
    }))
}

fn properties<'a>(event: &'a IcalEvent, name: &'a str) -> impl Iterator<Item = &'a Property> {
    event
        .properties
        .iter()
        .filter(move |property| property.name.eq_ignore_ascii_case(name))
}

fn property<'a>(event: &'a IcalEvent, name: &'a str) -> Option<&'a Property> {
    properties(event, name).next()
}

fn param<'a>(property: &'a Property, name: &str) -> Option<&'a str> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))?
        .1
        .first()
        .map(String::as_str)
}

fn text(event: &IcalEvent, name: &str) -> Option<String> {
    property(event, name)?.value.as_deref().map(unescape)
}

fn time(event: &IcalEvent, name: &'static str) -> Result<Option<CalTime>, ParseError> {
    property(event, name)
        .map(|property| {
            let value = property.value.as_deref().unwrap_or_default();
            parse_time(property, name, value)
        })
        .transpose()
}

/// Collects comma separated values across all occurrences of a property.
fn time_list(event: &IcalEvent, name: &'static str) -> Result<Vec<CalTime>, ParseError> {
    let mut times = Vec::new();
    for property in properties(event, name) {
        let Some(value) = property.value.as_deref() else {
            continue;
        };
        for item in value.split(',').filter(|item| !item.trim().is_empty()) {
            // PERIOD values contribute their start
            let item = item.split('/').next().unwrap_or(item);
            times.push(parse_time(property, name, item)?);
        }
    }
    Ok(times)
}

fn parse_time(property: &Property, name: &'static str, value: &str) -> Result<CalTime, ParseError> {
    let is_date = param(property, "VALUE").is_some_and(|kind| kind.eq_ignore_ascii_case("DATE"));

    CalTime::parse(value, param(property, "TZID"), is_date).ok_or_else(|| {
        ParseError::InvalidValue {
            property: name,
            value: value.to_owned(),
        }
    })
}

/// Reverses RFC 5545 TEXT escaping.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}
