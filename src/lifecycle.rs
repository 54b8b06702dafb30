use std::{fmt, str::FromStr};

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Event;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Upcoming,
    Ongoing,
    Completed,
}

impl LifecycleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upcoming" => Ok(Self::Upcoming),
            "ongoing" => Ok(Self::Ongoing),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown event status: {other}")),
        }
    }
}

/// Parses a backend timestamp into an instant.
///
/// RFC 3339 strings carry their own offset. Date-only strings are midnight
/// UTC. Date-times without an offset are wall-clock time in `tz`.
pub fn parse_instant<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())?;
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// Classifies an event start against `now`.
///
/// "Same day" means the same calendar date in `now`'s time zone, not a
/// 24-hour window. Unparseable starts are treated as completed.
pub fn classify<Tz: TimeZone>(date_time: &str, now: &DateTime<Tz>) -> LifecycleStatus {
    let tz = now.timezone();
    let Some(start) = parse_instant(date_time, &tz) else {
        return LifecycleStatus::Completed;
    };

    if start > now.with_timezone(&Utc) {
        LifecycleStatus::Upcoming
    } else if start.with_timezone(&tz).date_naive() == now.date_naive() {
        LifecycleStatus::Ongoing
    } else {
        LifecycleStatus::Completed
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationAvailability {
    Open,
    EventCompleted,
    DeadlinePassed,
}

/// Whether the registration form should accept submissions for `event`.
pub fn registration_availability<Tz: TimeZone>(
    event: &Event,
    now: &DateTime<Tz>,
) -> RegistrationAvailability {
    let tz = now.timezone();
    let now_utc = now.with_timezone(&Utc);

    let started = parse_instant(&event.date_time, &tz).is_some_and(|start| start < now_utc);
    if started {
        return RegistrationAvailability::EventCompleted;
    }

    let closed = event
        .registration_deadline
        .as_deref()
        .and_then(|deadline| parse_instant(deadline, &tz))
        .is_some_and(|deadline| deadline < now_utc);
    if closed {
        return RegistrationAvailability::DeadlinePassed;
    }

    RegistrationAvailability::Open
}
