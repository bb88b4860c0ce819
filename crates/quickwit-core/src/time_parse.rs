//! Start-time parsing.
//!
//! Users type start times in their own timezone using one of a few short
//! formats, tried in order:
//!
//! 1. `DD-MM-YYYY HH:MM`
//! 2. `DD/MM/YYYY HH:MM`
//! 3. `DD-MM HH:MM` (current year)
//! 4. `DD/MM HH:MM` (current year)
//! 5. `HH:MM` (today)
//!
//! "Current year" and "today" are taken in the user's timezone.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::ValidationError;

const FULL_FORMATS: [&str; 2] = ["%d-%m-%Y %H:%M", "%d/%m/%Y %H:%M"];

// The year is prepended to the input before matching these.
const YEARLESS_FORMATS: [&str; 2] = ["%Y %d-%m %H:%M", "%Y %d/%m %H:%M"];

const TIME_ONLY_FORMAT: &str = "%H:%M";

/// Parse `input` as a wall-clock time in `tz` and return it in UTC.
pub fn parse_start(input: &str, tz: Tz, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = input.trim();
    let today = now.with_timezone(&tz).date_naive();

    let naive = parse_naive(trimmed, today).ok_or_else(|| ValidationError::UnrecognisedStart {
        input: input.to_string(),
    })?;

    // A repeated wall-clock time resolves to the standard-time (later)
    // instant. Skipped times are rejected.
    tz.from_local_datetime(&naive)
        .latest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ValidationError::NonexistentLocalTime {
            input: input.to_string(),
            timezone: tz.name().to_string(),
        })
}

fn parse_naive(input: &str, today: NaiveDate) -> Option<NaiveDateTime> {
    FULL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .or_else(|| {
            let with_year = format!("{} {input}", today.year());
            YEARLESS_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(&with_year, fmt).ok())
        })
        .or_else(|| {
            NaiveTime::parse_from_str(input, TIME_ONLY_FORMAT)
                .ok()
                .map(|time| today.and_time(time))
        })
}
