//! Field validation shared by create and edit.
//!
//! Each check is pure; the coordinator runs the ones for fields the
//! caller actually supplied before touching any tier.

use chrono::{DateTime, TimeDelta, Utc};
use quickwit_store::{EventType, Registration, Status};

use crate::error::ValidationError;

pub const MAX_EVENT_NAME_LENGTH: usize = 25;
pub const MAX_EVENT_DESCRIPTION_LENGTH: usize = 1000;
pub const MIN_EVENT_DURATION_MINUTES: i64 = 1;
pub const MAX_EVENT_DURATION_MINUTES: i64 = 300;

pub fn check_name(name: &str) -> Result<(), ValidationError> {
    if name.chars().count() > MAX_EVENT_NAME_LENGTH {
        return Err(ValidationError::NameTooLong {
            max: MAX_EVENT_NAME_LENGTH,
        });
    }
    Ok(())
}

pub fn check_description(description: &str) -> Result<(), ValidationError> {
    if description.chars().count() > MAX_EVENT_DESCRIPTION_LENGTH {
        return Err(ValidationError::DescriptionTooLong {
            max: MAX_EVENT_DESCRIPTION_LENGTH,
        });
    }
    Ok(())
}

pub fn check_duration(minutes: i64) -> Result<(), ValidationError> {
    if !(MIN_EVENT_DURATION_MINUTES..=MAX_EVENT_DURATION_MINUTES).contains(&minutes) {
        return Err(ValidationError::DurationOutOfRange {
            min: MIN_EVENT_DURATION_MINUTES,
            max: MAX_EVENT_DURATION_MINUTES,
        });
    }
    Ok(())
}

pub fn check_reminder(minutes: i64) -> Result<(), ValidationError> {
    if minutes < 0 {
        return Err(ValidationError::NegativeReminder);
    }
    Ok(())
}

/// The reminder instant `minutes` before `start`.
///
/// Offsets that push the instant outside chrono's range are rejected
/// rather than wrapped.
pub fn reminder_before(
    start: DateTime<Utc>,
    minutes: i64,
) -> Result<DateTime<Utc>, ValidationError> {
    TimeDelta::try_minutes(minutes)
        .and_then(|offset| start.checked_sub_signed(offset))
        .ok_or(ValidationError::ReminderOutOfRange)
}

pub fn end_after(start: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>, ValidationError> {
    TimeDelta::try_minutes(minutes)
        .and_then(|length| start.checked_add_signed(length))
        .ok_or(ValidationError::DurationOutOfRange {
            min: MIN_EVENT_DURATION_MINUTES,
            max: MAX_EVENT_DURATION_MINUTES,
        })
}

pub fn parse_event_type(name: &str) -> Result<EventType, ValidationError> {
    EventType::parse(name).ok_or_else(|| ValidationError::UnknownEventType(name.to_string()))
}

pub fn parse_status(name: &str) -> Result<Status, ValidationError> {
    Status::parse(name).ok_or_else(|| ValidationError::UnknownStatus(name.to_string()))
}

/// Check a registration's job against the event type's taxonomy and
/// normalise it to the canonical spelling.
///
/// A missing job is accepted even when the type has a taxonomy.
pub fn normalise_job(
    event_type: EventType,
    mut registration: Registration,
) -> Result<Registration, ValidationError> {
    let Some(job) = registration.job.take() else {
        return Ok(registration);
    };

    if event_type.jobs().is_none() {
        return Err(ValidationError::JobNotAllowed { event_type });
    }
    let canonical = event_type
        .canonical_job(&job)
        .ok_or(ValidationError::UnknownJob { event_type, job })?;

    registration.job = Some(canonical.to_string());
    Ok(registration)
}
