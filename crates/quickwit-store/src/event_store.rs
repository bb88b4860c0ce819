//! Durable event and registration storage.
//!
//! [`EventStore`] is the table gateway over `events` and `registrations`
//! and the sole source of truth for both. Reads of a missing key return
//! `Ok(None)`; every `Err` is a storage failure.
//!
//! Temporal queries use deliberately different boundary conventions:
//! ended events match `utc_end <= now` (inclusive) while due reminders
//! match `utc_start > now AND reminder_at < now` (both strict).

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};

use crate::db::{Database, id_from_sql, id_to_sql};
use crate::error::{StoreError, StoreResult};
use crate::model::{EndedEvent, Event, EventType, Registration, Status};

const EVENT_COLUMNS: &str = "channel_id, event_type, name, description, scheduled_event_id, \
     organiser_id, utc_start, utc_end, guild_id, reminder_at";

/// CRUD and range queries over events and their registrations.
#[derive(Clone)]
pub struct EventStore {
    db: Database,
}

impl EventStore {
    /// Create a new event store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Upsert an event by primary key.
    ///
    /// Replaces every scalar field and the full registration set in one
    /// transaction. The event row is updated in place, so the delete
    /// cascade never fires on an overwrite.
    #[instrument(skip(self, event), fields(channel_id = event.channel_id))]
    pub async fn put(&self, event: &Event) -> StoreResult<()> {
        let row = EventRow::from_event(event)?;
        let registrations = event
            .registrations
            .iter()
            .map(RegistrationRow::from_registration)
            .collect::<StoreResult<Vec<_>>>()?;

        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO events (channel_id, event_type, name, description, \
                     scheduled_event_id, organiser_id, utc_start, utc_end, guild_id, reminder_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                     ON CONFLICT(channel_id) DO UPDATE SET \
                       event_type = excluded.event_type, \
                       name = excluded.name, \
                       description = excluded.description, \
                       scheduled_event_id = excluded.scheduled_event_id, \
                       organiser_id = excluded.organiser_id, \
                       utc_start = excluded.utc_start, \
                       utc_end = excluded.utc_end, \
                       guild_id = excluded.guild_id, \
                       reminder_at = excluded.reminder_at",
                    rusqlite::params![
                        row.channel_id,
                        row.event_type,
                        row.name,
                        row.description,
                        row.scheduled_event_id,
                        row.organiser_id,
                        row.utc_start,
                        row.utc_end,
                        row.guild_id,
                        row.reminder_at,
                    ],
                )?;

                tx.execute(
                    "DELETE FROM registrations WHERE channel_id = ?1",
                    rusqlite::params![row.channel_id],
                )?;
                for registration in &registrations {
                    upsert_registration(&tx, row.channel_id, registration)?;
                }

                tx.commit()?;
                debug!(
                    channel_id = row.channel_id,
                    registrations = registrations.len(),
                    "event stored"
                );
                Ok(())
            })
            .await
    }

    /// Fetch an event together with its registrations, or `None`.
    #[instrument(skip(self))]
    pub async fn get(&self, channel_id: u64) -> StoreResult<Option<Event>> {
        let key = id_to_sql(channel_id)?;
        self.db
            .execute(move |conn| {
                let row = conn
                    .query_row(
                        &format!("SELECT {EVENT_COLUMNS} FROM events WHERE channel_id = ?1"),
                        rusqlite::params![key],
                        EventRow::from_row,
                    )
                    .optional()?;

                let Some(row) = row else {
                    return Ok(None);
                };
                let registrations = load_registrations(conn, key)?;
                row.into_event(registrations).map(Some)
            })
            .await
    }

    /// Delete an event; registrations go with it via the cascade.
    ///
    /// Returns whether a row was removed. Deleting a missing key is not
    /// an error.
    #[instrument(skip(self))]
    pub async fn delete(&self, channel_id: u64) -> StoreResult<bool> {
        let key = id_to_sql(channel_id)?;
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM events WHERE channel_id = ?1",
                    rusqlite::params![key],
                )?;
                debug!(channel_id = key, deleted, "event delete");
                Ok(deleted > 0)
            })
            .await
    }

    /// Insert or overwrite one registration as a single atomic statement.
    ///
    /// Fails with [`StoreError::NotFound`] when the event does not exist.
    #[instrument(skip(self, registration), fields(user_id = registration.user_id))]
    pub async fn put_registration(
        &self,
        channel_id: u64,
        registration: &Registration,
    ) -> StoreResult<()> {
        let key = id_to_sql(channel_id)?;
        let row = RegistrationRow::from_registration(registration)?;
        self.db
            .execute(move |conn| {
                upsert_registration(conn, key, &row).map_err(|e| match e {
                    StoreError::Sqlite(err) if StoreError::is_foreign_key_violation(&err) => {
                        StoreError::NotFound {
                            entity: "event",
                            id: channel_id.to_string(),
                        }
                    }
                    other => other,
                })?;
                debug!(channel_id, user_id = row.user_id, "registration stored");
                Ok(())
            })
            .await
    }

    /// Remove one registration, returning whether it existed.
    #[instrument(skip(self))]
    pub async fn delete_registration(&self, channel_id: u64, user_id: u64) -> StoreResult<bool> {
        let key = id_to_sql(channel_id)?;
        let user = id_to_sql(user_id)?;
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM registrations WHERE channel_id = ?1 AND user_id = ?2",
                    rusqlite::params![key, user],
                )?;
                Ok(deleted > 0)
            })
            .await
    }

    /// Events whose end lies at or before `now` (inclusive boundary).
    #[instrument(skip(self))]
    pub async fn query_ended(&self, now: DateTime<Utc>) -> StoreResult<Vec<EndedEvent>> {
        let now = now.timestamp();
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT channel_id, scheduled_event_id, guild_id FROM events \
                     WHERE utc_end <= ?1 ORDER BY utc_end",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![now], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, Option<i64>>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(channel_id, scheduled_event_id, guild_id)| {
                        Ok(EndedEvent {
                            channel_id: id_from_sql("events", channel_id)?,
                            scheduled_event_id: scheduled_event_id
                                .map(|id| id_from_sql("events", id))
                                .transpose()?,
                            guild_id: id_from_sql("events", guild_id)?,
                        })
                    })
                    .collect()
            })
            .await
    }

    /// Events that have not started yet but whose reminder instant has
    /// passed. Both boundaries are strict.
    #[instrument(skip(self))]
    pub async fn query_due_reminders(&self, now: DateTime<Utc>) -> StoreResult<Vec<u64>> {
        let now = now.timestamp();
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT channel_id FROM events \
                     WHERE utc_start > ?1 AND reminder_at < ?1 ORDER BY utc_start",
                )?;
                collect_ids(&mut stmt, rusqlite::params![now])
            })
            .await
    }

    /// Channels of every event `user_id` is registered to.
    #[instrument(skip(self))]
    pub async fn registered_event_ids(&self, user_id: u64) -> StoreResult<Vec<u64>> {
        let user = id_to_sql(user_id)?;
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT channel_id FROM registrations WHERE user_id = ?1 ORDER BY channel_id",
                )?;
                collect_ids(&mut stmt, rusqlite::params![user])
            })
            .await
    }

    /// Channel of the event linked to an external scheduled event.
    #[instrument(skip(self))]
    pub async fn find_by_scheduled_event(&self, scheduled_event_id: u64) -> StoreResult<Option<u64>> {
        let scheduled = id_to_sql(scheduled_event_id)?;
        self.db
            .execute(move |conn| {
                let channel_id: Option<i64> = conn
                    .query_row(
                        "SELECT channel_id FROM events WHERE scheduled_event_id = ?1 LIMIT 1",
                        rusqlite::params![scheduled],
                        |row| row.get(0),
                    )
                    .optional()?;
                channel_id.map(|id| id_from_sql("events", id)).transpose()
            })
            .await
    }

    /// Set or clear the external scheduled event id without rewriting the
    /// event. Returns whether the event exists.
    #[instrument(skip(self))]
    pub async fn set_scheduled_event_id(
        &self,
        channel_id: u64,
        scheduled_event_id: Option<u64>,
    ) -> StoreResult<bool> {
        let key = id_to_sql(channel_id)?;
        let scheduled = scheduled_event_id.map(id_to_sql).transpose()?;
        self.db
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE events SET scheduled_event_id = ?2 WHERE channel_id = ?1",
                    rusqlite::params![key, scheduled],
                )?;
                Ok(updated > 0)
            })
            .await
    }

    /// Total number of stored events.
    pub async fn count(&self) -> StoreResult<i64> {
        self.db
            .execute(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Internal row mapping
// ═══════════════════════════════════════════════════════════════════════

fn upsert_registration(
    conn: &Connection,
    channel_id: i64,
    row: &RegistrationRow,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO registrations (channel_id, user_id, status, job) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(channel_id, user_id) DO UPDATE SET \
           status = excluded.status, job = excluded.job",
        rusqlite::params![channel_id, row.user_id, row.status, row.job],
    )?;
    Ok(())
}

fn load_registrations(conn: &Connection, channel_id: i64) -> StoreResult<Vec<Registration>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, status, job FROM registrations WHERE channel_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![channel_id], |row| {
            Ok(RegistrationRow {
                user_id: row.get(0)?,
                status: row.get(1)?,
                job: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(RegistrationRow::into_registration).collect()
}

fn collect_ids<P: rusqlite::Params>(
    stmt: &mut rusqlite::Statement<'_>,
    params: P,
) -> StoreResult<Vec<u64>> {
    let ids = stmt
        .query_map(params, |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    ids.into_iter().map(|id| id_from_sql("events", id)).collect()
}

fn timestamp_from_sql(column: &str, secs: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| StoreError::CorruptRow {
        table: "events",
        reason: format!("{column} out of range: {secs}"),
    })
}

/// Raw `events` row as SQLite stores it.
///
/// Keeps the row-mapping closure infallible beyond column access; enum
/// parsing and id/timestamp conversion happen in [`EventRow::into_event`].
struct EventRow {
    channel_id: i64,
    event_type: String,
    name: String,
    description: String,
    scheduled_event_id: Option<i64>,
    organiser_id: i64,
    utc_start: i64,
    utc_end: i64,
    guild_id: i64,
    reminder_at: i64,
}

impl EventRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            channel_id: row.get(0)?,
            event_type: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            scheduled_event_id: row.get(4)?,
            organiser_id: row.get(5)?,
            utc_start: row.get(6)?,
            utc_end: row.get(7)?,
            guild_id: row.get(8)?,
            reminder_at: row.get(9)?,
        })
    }

    fn from_event(event: &Event) -> StoreResult<Self> {
        Ok(Self {
            channel_id: id_to_sql(event.channel_id)?,
            event_type: event.event_type.as_str().to_string(),
            name: event.name.clone(),
            description: event.description.clone(),
            scheduled_event_id: event.scheduled_event_id.map(id_to_sql).transpose()?,
            organiser_id: id_to_sql(event.organiser_id)?,
            utc_start: event.utc_start.timestamp(),
            utc_end: event.utc_end.timestamp(),
            guild_id: id_to_sql(event.guild_id)?,
            reminder_at: event.reminder_at.timestamp(),
        })
    }

    fn into_event(self, registrations: Vec<Registration>) -> StoreResult<Event> {
        let event_type =
            EventType::parse(&self.event_type).ok_or_else(|| StoreError::CorruptRow {
                table: "events",
                reason: format!("unknown event_type '{}'", self.event_type),
            })?;

        Ok(Event {
            channel_id: id_from_sql("events", self.channel_id)?,
            event_type,
            name: self.name,
            description: self.description,
            organiser_id: id_from_sql("events", self.organiser_id)?,
            utc_start: timestamp_from_sql("utc_start", self.utc_start)?,
            utc_end: timestamp_from_sql("utc_end", self.utc_end)?,
            guild_id: id_from_sql("events", self.guild_id)?,
            reminder_at: timestamp_from_sql("reminder_at", self.reminder_at)?,
            scheduled_event_id: self
                .scheduled_event_id
                .map(|id| id_from_sql("events", id))
                .transpose()?,
            registrations,
        })
    }
}

/// Raw `registrations` row.
struct RegistrationRow {
    user_id: i64,
    status: String,
    job: Option<String>,
}

impl RegistrationRow {
    fn from_registration(registration: &Registration) -> StoreResult<Self> {
        Ok(Self {
            user_id: id_to_sql(registration.user_id)?,
            status: registration.status.as_str().to_string(),
            job: registration.job.clone(),
        })
    }

    fn into_registration(self) -> StoreResult<Registration> {
        let status = Status::parse(&self.status).ok_or_else(|| StoreError::CorruptRow {
            table: "registrations",
            reason: format!("unknown status '{}'", self.status),
        })?;
        Ok(Registration {
            user_id: id_from_sql("registrations", self.user_id)?,
            status,
            job: self.job,
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "event_store_tests.rs"]
mod tests;
