//! Coordinator settings.
//!
//! Deserialised from the `[events]` section of `config/default.toml`.
//! Every field is optional in the file; missing ones take the defaults
//! below.

use serde::Deserialize;

/// Create-time defaults applied when the caller leaves a field out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Event length in minutes when no duration is given.
    pub default_duration_minutes: i64,
    /// Minutes before the start at which the reminder falls due.
    pub default_reminder_minutes: i64,
    /// Event type name used when none is given.
    pub default_event_type: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_duration_minutes: 60,
            default_reminder_minutes: 30,
            default_event_type: "Final Fantasy XIV".to_string(),
        }
    }
}
