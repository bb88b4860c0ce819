//! Core error types.
//!
//! Every coordinator operation returns [`CoreError`]. The first three
//! categories are rejections the caller recovers from locally (typically
//! by showing [`ValidationError`]'s message to the user); `Storage` and
//! `Cache` abort the current operation and are safe to retry.

use quickwit_store::{EventType, StoreError};

/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Unified error type for the event lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed or out-of-range input. Nothing was mutated.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No event is bound to the channel.
    #[error("no event is associated with channel {channel_id}")]
    NotFound { channel_id: u64 },

    /// The actor is not the event's organiser.
    #[error("user {actor_id} is not the organiser of the event in channel {channel_id}")]
    Unauthorized { channel_id: u64, actor_id: u64 },

    /// Durable storage failed; no partial state was committed.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    /// The cache could not encode or decode an entry.
    #[error("cache error: {0}")]
    Cache(String),
}

impl CoreError {
    /// `true` for rejections caused by the caller's input or identity, as
    /// opposed to infrastructure failures.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound { .. } | Self::Unauthorized { .. }
        )
    }
}

/// A rejected field, with a message fit for the end user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("The event name must be {max} characters or fewer.")]
    NameTooLong { max: usize },

    #[error("Description cannot be more than {max} characters.")]
    DescriptionTooLong { max: usize },

    #[error("Duration must be between {min} and {max} minutes.")]
    DurationOutOfRange { min: i64, max: i64 },

    #[error("Reminder must be a positive number of minutes.")]
    NegativeReminder,

    #[error("Reminder is too far before the event start.")]
    ReminderOutOfRange,

    #[error("Could not match '{input}' to any supported format ([DD-MM[-YYYY]] HH:MM).")]
    UnrecognisedStart { input: String },

    #[error("'{input}' does not exist in timezone {timezone}.")]
    NonexistentLocalTime { input: String, timezone: String },

    #[error("Cannot schedule an event in the past.")]
    StartInPast,

    #[error("Unknown event type '{0}'.")]
    UnknownEventType(String),

    #[error("Unknown attendance status '{0}'.")]
    UnknownStatus(String),

    #[error("Invalid timezone '{0}', please use a valid timezone (e.g. 'America/New_York').")]
    UnknownTimezone(String),

    #[error("{event_type} events do not take a job.")]
    JobNotAllowed { event_type: EventType },

    #[error("'{job}' is not a job for {event_type} events.")]
    UnknownJob { event_type: EventType, job: String },

    #[error("Channel {channel_id} already hosts an event.")]
    ChannelInUse { channel_id: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_are_classified() {
        assert!(CoreError::from(ValidationError::StartInPast).is_user_error());
        assert!(CoreError::NotFound { channel_id: 1 }.is_user_error());
        assert!(
            CoreError::Unauthorized {
                channel_id: 1,
                actor_id: 2
            }
            .is_user_error()
        );
        assert!(!CoreError::from(StoreError::TaskJoin("boom".into())).is_user_error());
    }

    #[test]
    fn validation_messages_are_user_facing() {
        let err = CoreError::from(ValidationError::NameTooLong { max: 25 });
        assert_eq!(
            err.to_string(),
            "The event name must be 25 characters or fewer."
        );
        let err = ValidationError::UnknownJob {
            event_type: EventType::CampfireEvent,
            job: "Model".into(),
        };
        assert_eq!(err.to_string(), "'Model' is not a job for Campfire Event events.");
    }
}
