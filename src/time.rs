use chrono::{
    DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::error::ConversionError;

const DATE_FORMAT: &str = "%Y%m%d";
const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// A calendar time exactly as the feed states it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalTime {
    Utc(DateTime<Utc>),
    Zoned { time: NaiveDateTime, tzid: String },
    Floating(NaiveDateTime),
    Date(NaiveDate),
}

impl CalTime {
    /// Parses a DATE or DATE-TIME value. `tzid` is the value of the TZID parameter.
    pub fn parse(value: &str, tzid: Option<&str>, is_date: bool) -> Option<Self> {
        let value = value.trim();

        if is_date || (value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit())) {
            return NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .map(Self::Date);
        }

        if let Some(utc) = value.strip_suffix('Z') {
            let time = NaiveDateTime::parse_from_str(utc, DATE_TIME_FORMAT).ok()?;
            return Some(Self::Utc(Utc.from_utc_datetime(&time)));
        }

        let time = NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT).ok()?;
        Some(match tzid {
            Some(tzid) => Self::Zoned {
                time,
                tzid: tzid.to_owned(),
            },
            None => Self::Floating(time),
        })
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Resolves to an absolute instant. All-day dates start at midnight in `reference`.
    pub fn to_utc(&self, reference: Tz) -> Result<DateTime<Utc>, ConversionError> {
        match self {
            Self::Utc(time) => Ok(*time),
            Self::Zoned { time, tzid } => localize(*time, resolve_zone(tzid)?),
            Self::Floating(time) => Err(ConversionError::Floating(*time)),
            Self::Date(date) => localize(date.and_time(NaiveTime::MIN), reference),
        }
    }
}

/// Windows zone names as emitted by Outlook and Exchange, mapped to the IANA
/// zone of their primary territory.
const WINDOWS_ZONES: &[(&str, &str)] = &[
    ("Dateline Standard Time", "Etc/GMT+12"),
    ("Hawaiian Standard Time", "Pacific/Honolulu"),
    ("Alaskan Standard Time", "America/Anchorage"),
    ("Pacific Standard Time", "America/Los_Angeles"),
    ("US Mountain Standard Time", "America/Phoenix"),
    ("Mountain Standard Time", "America/Denver"),
    ("Central Standard Time", "America/Chicago"),
    ("Central America Standard Time", "America/Guatemala"),
    ("Central Standard Time (Mexico)", "America/Mexico_City"),
    ("Canada Central Standard Time", "America/Regina"),
    ("Eastern Standard Time", "America/New_York"),
    ("US Eastern Standard Time", "America/Indianapolis"),
    ("SA Pacific Standard Time", "America/Bogota"),
    ("Atlantic Standard Time", "America/Halifax"),
    ("Newfoundland Standard Time", "America/St_Johns"),
    ("E. South America Standard Time", "America/Sao_Paulo"),
    ("Argentina Standard Time", "America/Buenos_Aires"),
    ("UTC", "Etc/UTC"),
    ("GMT Standard Time", "Europe/London"),
    ("Greenwich Standard Time", "Atlantic/Reykjavik"),
    ("W. Europe Standard Time", "Europe/Berlin"),
    ("Central Europe Standard Time", "Europe/Budapest"),
    ("Romance Standard Time", "Europe/Paris"),
    ("Central European Standard Time", "Europe/Warsaw"),
    ("W. Central Africa Standard Time", "Africa/Lagos"),
    ("GTB Standard Time", "Europe/Bucharest"),
    ("E. Europe Standard Time", "Europe/Chisinau"),
    ("FLE Standard Time", "Europe/Kiev"),
    ("Egypt Standard Time", "Africa/Cairo"),
    ("South Africa Standard Time", "Africa/Johannesburg"),
    ("Israel Standard Time", "Asia/Jerusalem"),
    ("Turkey Standard Time", "Europe/Istanbul"),
    ("Russian Standard Time", "Europe/Moscow"),
    ("Arab Standard Time", "Asia/Riyadh"),
    ("Arabian Standard Time", "Asia/Dubai"),
    ("Iran Standard Time", "Asia/Tehran"),
    ("Pakistan Standard Time", "Asia/Karachi"),
    ("India Standard Time", "Asia/Calcutta"),
    ("Nepal Standard Time", "Asia/Katmandu"),
    ("Bangladesh Standard Time", "Asia/Dhaka"),
    ("SE Asia Standard Time", "Asia/Bangkok"),
    ("China Standard Time", "Asia/Shanghai"),
    ("Singapore Standard Time", "Asia/Singapore"),
    ("Taipei Standard Time", "Asia/Taipei"),
    ("Tokyo Standard Time", "Asia/Tokyo"),
    ("Korea Standard Time", "Asia/Seoul"),
    ("AUS Central Standard Time", "Australia/Darwin"),
    ("E. Australia Standard Time", "Australia/Brisbane"),
    ("AUS Eastern Standard Time", "Australia/Sydney"),
    ("New Zealand Standard Time", "Pacific/Auckland"),
];

/// Looks up an IANA zone from a TZID parameter value.
///
/// Besides plain IANA names this accepts Windows zone names and vendor
/// prefixed ids such as `/mozilla.org/20050126_1/Europe/Berlin`, where the
/// longest trailing segment run naming a known zone wins.
pub fn resolve_zone(tzid: &str) -> Result<Tz, ConversionError> {
    let name = tzid.trim().trim_matches('"').trim_start_matches('/');

    if let Ok(zone) = name.parse::<Tz>() {
        return Ok(zone);
    }

    if let Some((_, iana)) = WINDOWS_ZONES
        .iter()
        .find(|(windows, _)| windows.eq_ignore_ascii_case(name))
    {
        return iana
            .parse::<Tz>()
            .map_err(|_| ConversionError::UnknownTimeZone(tzid.to_owned()));
    }

    let segments: Vec<&str> = name.split('/').collect();
    (1..segments.len())
        .find_map(|skip| segments[skip..].join("/").parse::<Tz>().ok())
        .ok_or_else(|| ConversionError::UnknownTimeZone(tzid.to_owned()))
}

/// Local time in `zone` to UTC. Ambiguous times resolve to the earlier instant.
pub fn localize(time: NaiveDateTime, zone: Tz) -> Result<DateTime<Utc>, ConversionError> {
    zone.from_local_datetime(&time)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ConversionError::NonExistent {
            time,
            zone: zone.name().to_owned(),
        })
}

/// January 1, 00:00 of the year `now` falls in, as observed in `reference`.
pub fn year_start(now: DateTime<Utc>, reference: Tz) -> Result<DateTime<Utc>, ConversionError> {
    let today = now.with_timezone(&reference).date_naive();
    let midnight = today
        .with_ordinal(1)
        .unwrap_or(today)
        .and_time(NaiveTime::MIN);

    localize(midnight, reference)
}

/// Parses an RFC 5545 DURATION value such as `PT1H30M`, `P1D` or `-P2W`.
pub fn parse_duration(value: &str) -> Option<TimeDelta> {
    let value = value.trim();
    let (sign, rest) = match value.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, value.strip_prefix('+').unwrap_or(value)),
    };

    let mut seconds: i64 = 0;
    let mut digits = String::new();
    let mut in_time = false;
    let mut saw_unit = false;

    for c in rest.strip_prefix('P')?.chars() {
        let unit = match c {
            '0'..='9' => {
                digits.push(c);
                continue;
            }
            'T' if !in_time && digits.is_empty() => {
                in_time = true;
                continue;
            }
            'W' if !in_time => 7 * 86_400,
            'D' if !in_time => 86_400,
            'H' if in_time => 3_600,
            'M' if in_time => 60,
            'S' if in_time => 1,
            _ => return None,
        };

        let amount = digits.parse::<i64>().ok()?;
        seconds = seconds.checked_add(amount.checked_mul(unit)?)?;
        digits.clear();
        saw_unit = true;
    }

    if !saw_unit || !digits.is_empty() {
        return None;
    }

    TimeDelta::try_seconds(sign * seconds)
}
