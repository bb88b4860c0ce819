//! Per-user timezone preferences.
//!
//! Stores the IANA zone name each user entered their start times in.
//! Validation of the name happens in the caller; this is a plain
//! key-value table.

use rusqlite::OptionalExtension;
use tracing::{debug, instrument};

use crate::db::{Database, id_to_sql};
use crate::error::StoreResult;

/// Persistent `user_id -> timezone` mapping.
#[derive(Clone)]
pub struct TimezoneStore {
    db: Database,
}

impl TimezoneStore {
    /// Create a new timezone store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a user's timezone name, returning `None` if never set.
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: u64) -> StoreResult<Option<String>> {
        let user = id_to_sql(user_id)?;
        self.db
            .execute(move |conn| {
                let timezone = conn
                    .query_row(
                        "SELECT timezone FROM user_timezones WHERE user_id = ?1",
                        rusqlite::params![user],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(timezone)
            })
            .await
    }

    /// Set a user's timezone name (insert or update).
    #[instrument(skip(self))]
    pub async fn set(&self, user_id: u64, timezone: &str) -> StoreResult<()> {
        let user = id_to_sql(user_id)?;
        let timezone = timezone.to_string();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO user_timezones (user_id, timezone) VALUES (?1, ?2) \
                     ON CONFLICT(user_id) DO UPDATE SET timezone = excluded.timezone",
                    rusqlite::params![user, timezone],
                )?;
                debug!(user_id = user, timezone = %timezone, "user timezone updated");
                Ok(())
            })
            .await
    }
}

// ── tests ────────────────────────────────────────────────────────────
