//! Turning a local race date and clock time into a UTC instant.
//!
//! The wall time is first read as if it were UTC, then shifted by the zone's
//! offset at that provisional instant. When a DST change falls between the
//! guess and the answer, one more shift by the residual settles it.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use regatta_core::AppError;
use regatta_services::Race;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EventTimeError {
    #[error("Invalid clock time {0:?}, expected HH:MM or HH:MM:SS")]
    InvalidTime(String),
    #[error("Unknown timezone {0:?}")]
    UnknownTimezone(String),
}

impl EventTimeError {
    pub fn user_message(&self) -> &'static str {
        match self {
            EventTimeError::InvalidTime(_) => "The start time must look like 13:55 or 13:55:00.",
            EventTimeError::UnknownTimezone(_) => "The venue timezone is not recognised.",
        }
    }
}

impl From<EventTimeError> for AppError {
    fn from(e: EventTimeError) -> Self {
        AppError::Weather(regatta_core::WeatherError::InvalidEventTime(e.to_string()))
    }
}

/// Parse `HH:MM` or `HH:MM:SS` (24-hour, two digits per field)
pub fn parse_clock_time(value: &str) -> Result<NaiveTime, EventTimeError> {
    let value = value.trim();
    let invalid = || EventTimeError::InvalidTime(value.to_string());

    let fields: Vec<&str> = value.split(':').collect();
    if !(2..=3).contains(&fields.len())
        || fields
            .iter()
            .any(|f| f.len() != 2 || !f.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(invalid());
    }

    let mut numbers = fields.iter().map(|f| f.parse::<u32>());
    let hour = numbers.next().and_then(Result::ok).ok_or_else(invalid)?;
    let minute = numbers.next().and_then(Result::ok).ok_or_else(invalid)?;
    let second = match numbers.next() {
        Some(n) => n.map_err(|_| invalid())?,
        None => 0,
    };

    NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(invalid)
}

pub fn parse_timezone(name: &str) -> Result<Tz, EventTimeError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| EventTimeError::UnknownTimezone(name.to_string()))
}

/// UTC instant at which clocks in `tz` show `local`
pub fn local_to_utc(local: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    let provisional = Utc.from_utc_datetime(&local);
    let offset = wall_clock(provisional, tz) - local;
    let corrected = provisional - offset;

    let residual = wall_clock(corrected, tz) - local;
    if residual.is_zero() {
        corrected
    } else {
        tracing::debug!("Offset changed near {} in {}, correcting by {}", local, tz, residual);
        corrected - residual
    }
}

fn wall_clock(instant: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    instant.with_timezone(&tz).naive_local()
}

/// UTC instant for a race date, local clock time and optional IANA zone.
///
/// Without a zone the time is taken as UTC.
pub fn event_instant(
    date: NaiveDate,
    time: &str,
    timezone: Option<&str>,
) -> Result<DateTime<Utc>, EventTimeError> {
    let local = date.and_time(parse_clock_time(time)?);
    match timezone.filter(|tz| !tz.trim().is_empty()) {
        Some(name) => Ok(local_to_utc(local, parse_timezone(name)?)),
        None => Ok(Utc.from_utc_datetime(&local)),
    }
}

/// When the race's weather matters: the warning signal if one is set, else the stored start.
///
/// A start stored at UTC midnight is a bare calendar date and is used as is.
/// Any other stored start is read as a local date in the venue's zone.
pub fn race_event_instant(race: &Race) -> Result<DateTime<Utc>, EventTimeError> {
    let Some(time) = race.warning_signal_time.as_deref().filter(|t| !t.trim().is_empty()) else {
        return Ok(race.start_date);
    };

    let timezone = race.timezone.as_deref().filter(|tz| !tz.trim().is_empty());
    let date = match timezone {
        Some(name) if race.start_date.time() != NaiveTime::MIN => {
            race.start_date.with_timezone(&parse_timezone(name)?).date_naive()
        }
        _ => race.start_date.date_naive(),
    };
    event_instant(date, time, timezone)
}
