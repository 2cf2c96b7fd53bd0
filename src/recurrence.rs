use std::collections::HashSet;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;
use tracing::debug;

use crate::error::{ConversionError, ParseError, Result};
use crate::structs::{Calendar, EventDefinition, Occurrence};
use crate::time::{localize, resolve_zone, CalTime};

const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Bounds for expanding recurring definitions.
#[derive(Debug, Clone, Copy)]
pub struct Expansion {
    /// Zone that all-day dates are anchored to.
    pub reference: Tz,
    /// Upper bound on generated instances per definition.
    pub limit: u16,
}

impl Calendar {
    /// All occurrences starting at or after `from`, ordered by start and then
    /// by definition order.
    pub fn occurrences_from(
        &self,
        from: DateTime<Utc>,
        expansion: &Expansion,
    ) -> Result<Vec<Occurrence>> {
        let mut overridden = HashSet::new();
        for event in &self.events {
            if let (Some(uid), Some(recurrence_id)) = (&event.uid, &event.recurrence_id) {
                overridden.insert((uid.as_str(), recurrence_id.to_utc(expansion.reference)?));
            }
        }

        let mut occurrences = Vec::new();
        for event in &self.events {
            let replaced = |start: &DateTime<Utc>| match (&event.uid, &event.recurrence_id) {
                (Some(uid), None) => overridden.contains(&(uid.as_str(), *start)),
                _ => false,
            };

            occurrences.extend(
                event
                    .starts_from(from, expansion)?
                    .into_iter()
                    .filter(|start| !replaced(start))
                    .map(|start| Occurrence {
                        source: event.id,
                        start,
                    }),
            );
        }

        occurrences.sort_by_key(|occurrence| (occurrence.start, occurrence.source));
        Ok(occurrences)
    }
}

impl EventDefinition {
    /// Start instants of this definition at or after `from`.
    pub fn starts_from(
        &self,
        from: DateTime<Utc>,
        expansion: &Expansion,
    ) -> Result<Vec<DateTime<Utc>>> {
        let reference = expansion.reference;

        let mut starts = match &self.recurrence.rule {
            Some(rule) => expand_rule(&self.start, rule, from, expansion)?,
            None => vec![self.start_utc(reference)?],
        };

        for rdate in &self.recurrence.rdates {
            starts.push(rdate.to_utc(reference)?);
        }

        let exdates = self
            .recurrence
            .exdates
            .iter()
            .map(|exdate| exdate.to_utc(reference))
            .collect::<Result<HashSet<_>, _>>()?;

        starts.retain(|start| *start >= from && !exdates.contains(start));
        starts.sort();
        starts.dedup();

        Ok(starts)
    }
}

fn expand_rule(
    start: &CalTime,
    rule: &str,
    from: DateTime<Utc>,
    expansion: &Expansion,
) -> Result<Vec<DateTime<Utc>>> {
    let zone = anchor_zone(start, expansion.reference)?;
    let source = format!(
        "{}\nRRULE:{}",
        dtstart(start, zone),
        normalize_until(rule, zone)?
    );

    let set = source
        .parse::<RRuleSet>()
        .map_err(|err| ParseError::Recurrence {
            rule: rule.to_owned(),
            reason: err.to_string(),
        })?;

    let result = set
        .after(from.with_timezone(&rrule::Tz::UTC))
        .all(expansion.limit);

    if result.limited {
        debug!(rule, limit = expansion.limit, "Recurrence expansion hit limit");
    }

    Ok(result
        .dates
        .into_iter()
        .map(|date| date.with_timezone(&Utc))
        .collect())
}

/// Zone a series is expanded in. All-day series live in `reference`.
fn anchor_zone(start: &CalTime, reference: Tz) -> Result<Tz, ConversionError> {
    match start {
        CalTime::Utc(_) => Ok(Tz::UTC),
        CalTime::Zoned { tzid, .. } => resolve_zone(tzid),
        CalTime::Floating(time) => Err(ConversionError::Floating(*time)),
        CalTime::Date(_) => Ok(reference),
    }
}

/// Renders the DTSTART line the recurrence engine expects.
fn dtstart(start: &CalTime, zone: Tz) -> String {
    match start {
        CalTime::Utc(time) => format!("DTSTART:{}Z", time.format(DATE_TIME_FORMAT)),
        CalTime::Zoned { time, .. } | CalTime::Floating(time) => format!(
            "DTSTART;TZID={}:{}",
            zone.name(),
            time.format(DATE_TIME_FORMAT)
        ),
        CalTime::Date(date) => format!(
            "DTSTART;TZID={}:{}T000000",
            zone.name(),
            date.format("%Y%m%d")
        ),
    }
}

/// Rewrites UNTIL as a UTC instant, which a zoned DTSTART requires. A DATE
/// covers its whole day and a floating value is read in `zone`.
fn normalize_until(rule: &str, zone: Tz) -> Result<String> {
    let mut parts = Vec::new();

    for part in rule.split(';') {
        let Some(value) = part
            .split_once('=')
            .filter(|(key, _)| key.trim().eq_ignore_ascii_case("UNTIL"))
            .map(|(_, value)| value.trim())
        else {
            parts.push(part.to_owned());
            continue;
        };

        let until = match CalTime::parse(value, None, false) {
            Some(CalTime::Utc(time)) => time,
            Some(CalTime::Floating(time)) => localize(time, zone)?,
            Some(CalTime::Date(date)) => localize(
                date.and_time(NaiveTime::MIN) + TimeDelta::seconds(86_399),
                zone,
            )?,
            Some(CalTime::Zoned { .. }) | None => {
                return Err(ParseError::Recurrence {
                    rule: rule.to_owned(),
                    reason: format!("invalid UNTIL value {value:?}"),
                }
                .into())
            }
        };

        parts.push(format!("UNTIL={}Z", until.format(DATE_TIME_FORMAT)));
    }

    Ok(parts.join(";"))
}

#[cfg(test)]
mod tests {
    use chrono_tz::Europe::Berlin;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::parse_calendar;
    use crate::structs::EventId;

    const EXPANSION: Expansion = Expansion {
        reference: Berlin,
        limit: 10,
    };

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn feed(events: &str) -> Calendar {
        parse_calendar(format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\n{events}END:VCALENDAR\r\n"
        ))
        .unwrap()
    }

    #[test]
    fn expands_series_from_window_not_from_definition() {
        let calendar = feed(
            "BEGIN:VEVENT\r\n\
             UID:weekly@example.com\r\n\
             DTSTART;TZID=Europe/Berlin:20240601T100000\r\n\
             DTEND;TZID=Europe/Berlin:20240601T120000\r\n\
             RRULE:FREQ=WEEKLY\r\n\
             END:VEVENT\r\n",
        );

        let occurrences = calendar
            .occurrences_from(utc("2024-12-31T23:00:00Z"), &EXPANSION)
            .unwrap();

        assert_eq!(occurrences.len(), 10);
        assert_eq!(occurrences[0].start, utc("2025-01-04T09:00:00Z"));
        assert!(occurrences.iter().all(|o| o.source == EventId(0)));
    }

    #[test]
    fn finished_series_yields_nothing() {
        let calendar = feed(
            "BEGIN:VEVENT\r\n\
             DTSTART:20240601T100000Z\r\n\
             RRULE:FREQ=DAILY;COUNT=3\r\n\
             END:VEVENT\r\n",
        );

        let occurrences = calendar
            .occurrences_from(utc("2025-01-01T00:00:00Z"), &EXPANSION)
            .unwrap();
        assert!(occurrences.is_empty());
    }

    #[test]
    fn exdates_and_overrides_remove_instances() {
        let calendar = feed(
            "BEGIN:VEVENT\r\n\
             UID:standup@example.com\r\n\
             DTSTART:20250106T080000Z\r\n\
             RRULE:FREQ=DAILY;COUNT=3\r\n\
             EXDATE:20250107T080000Z\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:standup@example.com\r\n\
             RECURRENCE-ID:20250108T080000Z\r\n\
             DTSTART:20250108T090000Z\r\n\
             END:VEVENT\r\n",
        );

        let occurrences = calendar
            .occurrences_from(utc("2025-01-01T00:00:00Z"), &EXPANSION)
            .unwrap();

        assert_eq!(
            occurrences,
            vec![
                Occurrence {
                    source: EventId(0),
                    start: utc("2025-01-06T08:00:00Z"),
                },
                Occurrence {
                    source: EventId(1),
                    start: utc("2025-01-08T09:00:00Z"),
                },
            ]
        );
    }

    #[test]
    fn rdates_add_instances() {
        let calendar = feed(
            "BEGIN:VEVENT\r\n\
             DTSTART:20240301T080000Z\r\n\
             RDATE:20250301T080000Z,20250401T080000Z\r\n\
             END:VEVENT\r\n",
        );

        let starts = calendar.events[0]
            .starts_from(utc("2025-01-01T00:00:00Z"), &EXPANSION)
            .unwrap();
        assert_eq!(
            starts,
            vec![utc("2025-03-01T08:00:00Z"), utc("2025-04-01T08:00:00Z")]
        );
    }

    #[test]
    fn until_without_zone_follows_the_series() {
        let expansion = Expansion {
            reference: Berlin,
            limit: 100,
        };
        let calendar = feed(
            "BEGIN:VEVENT\r\n\
             UID:anniversary@example.com\r\n\
             DTSTART;VALUE=DATE:20240410\r\n\
             RRULE:FREQ=YEARLY;UNTIL=20300410\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:market@example.com\r\n\
             DTSTART;TZID=Europe/Berlin:20240601T080000\r\n\
             RRULE:FREQ=WEEKLY;UNTIL=20250601T080000\r\n\
             END:VEVENT\r\n",
        );
        // Year start of 2025-06-01 in Berlin.
        let from = utc("2024-12-31T23:00:00Z");

        let yearly = calendar.events[0].starts_from(from, &expansion).unwrap();
        assert_eq!(yearly.len(), 6);
        assert_eq!(yearly[0], utc("2025-04-09T22:00:00Z"));
        assert_eq!(yearly[5], utc("2030-04-09T22:00:00Z"));

        let weekly = calendar.events[1].starts_from(from, &expansion).unwrap();
        assert_eq!(weekly.len(), 22);
        assert_eq!(weekly[0], utc("2025-01-04T07:00:00Z"));
        assert_eq!(weekly[21], utc("2025-05-31T06:00:00Z"));
    }

    #[test]
    fn until_is_rewritten_in_utc() {
        assert_eq!(
            normalize_until("FREQ=DAILY;UNTIL=20250301", Berlin).unwrap(),
            "FREQ=DAILY;UNTIL=20250301T225959Z"
        );
        assert_eq!(
            normalize_until("FREQ=DAILY;until=20250701T080000;INTERVAL=2", Berlin).unwrap(),
            "FREQ=DAILY;UNTIL=20250701T060000Z;INTERVAL=2"
        );
        assert_eq!(
            normalize_until("FREQ=DAILY;UNTIL=20250301T080000Z", Berlin).unwrap(),
            "FREQ=DAILY;UNTIL=20250301T080000Z"
        );
        assert!(matches!(
            normalize_until("FREQ=DAILY;UNTIL=soon", Berlin),
            Err(crate::Error::Parse(ParseError::Recurrence { .. }))
        ));
    }

    #[test]
    fn invalid_rule_is_a_parse_error() {
        let calendar = feed(
            "BEGIN:VEVENT\r\n\
             DTSTART:20250301T080000Z\r\n\
             RRULE:FREQ=SOMETIMES\r\n\
             END:VEVENT\r\n",
        );

        let result = calendar.occurrences_from(utc("2025-01-01T00:00:00Z"), &EXPANSION);
        assert!(matches!(
            result,
            Err(crate::Error::Parse(ParseError::Recurrence { .. }))
        ));
    }

    #[test]
    fn floating_series_is_a_conversion_error() {
        let calendar = feed(
            "BEGIN:VEVENT\r\n\
             DTSTART:20250301T080000\r\n\
             RRULE:FREQ=DAILY\r\n\
             END:VEVENT\r\n",
        );

        let result = calendar.occurrences_from(utc("2025-01-01T00:00:00Z"), &EXPANSION);
        assert!(matches!(
            result,
            Err(crate::Error::Conversion(ConversionError::Floating(_)))
        ));
    }
}
