//! Versioned schema for the event store.
//!
//! Each applied version is recorded in `_migrations`. A database stamped
//! with a version this build does not know is refused rather than read
//! with a schema it may not match.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// Strictly increasing by version. Version 2 rewrites event types saved
/// under their old class names.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "events, registrations and user timezones",
        sql: r#"
            CREATE TABLE events (
                channel_id         INTEGER PRIMARY KEY,
                event_type         TEXT NOT NULL,
                name               TEXT NOT NULL,
                description        TEXT NOT NULL,
                scheduled_event_id INTEGER,
                organiser_id       INTEGER NOT NULL,
                utc_start          INTEGER NOT NULL,
                utc_end            INTEGER NOT NULL,
                guild_id           INTEGER NOT NULL,
                reminder_at        INTEGER NOT NULL
            );
            CREATE INDEX idx_events_utc_end ON events(utc_end);
            CREATE INDEX idx_events_utc_start ON events(utc_start);
            CREATE INDEX idx_events_scheduled ON events(scheduled_event_id);

            CREATE TABLE registrations (
                channel_id INTEGER NOT NULL REFERENCES events(channel_id) ON DELETE CASCADE,
                user_id    INTEGER NOT NULL,
                status     TEXT NOT NULL CHECK(status IN ('Attending','Bench','Tentative','Late')),
                job        TEXT,
                PRIMARY KEY (channel_id, user_id)
            );
            CREATE INDEX idx_registrations_user ON registrations(user_id);

            CREATE TABLE user_timezones (
                user_id  INTEGER PRIMARY KEY,
                timezone TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        description: "modernize legacy event_type names",
        sql: r#"
            UPDATE events SET event_type = 'Final Fantasy XIV' WHERE event_type = 'FF14Event';
            UPDATE events SET event_type = 'Fashion Show' WHERE event_type = 'FashionShow';
            UPDATE events SET event_type = 'Campfire Event' WHERE event_type = 'CampfireEvent';
        "#,
    },
];

// ── public API ───────────────────────────────────────────────────────

/// The newest schema version this build knows how to produce.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Bring the schema up to [`latest_version`] and return it.
///
/// Synchronous; the async callers run it on the blocking pool.
pub fn run_all(conn: &Connection) -> StoreResult<u32> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let latest = latest_version();
    if current > latest {
        return Err(StoreError::Migration {
            version: current,
            message: format!("database schema is newer than this build supports (v{latest})"),
        });
    }
    if current == latest {
        debug!(version = current, "event schema is up to date");
        return Ok(current);
    }

    info!(from = current, to = latest, "upgrading event schema");
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration)?;
    }
    Ok(latest)
}

/// The highest recorded version, or 0 for a database never migrated.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )
    .map_err(failed(0, "read current version"))
}

// ── internals ────────────────────────────────────────────────────────

fn failed(version: u32, stage: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |err| StoreError::Migration {
        version,
        message: format!("{stage}: {err}"),
    }
}

fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(failed(0, "create _migrations"))
}

/// Apply one migration and record it, atomically. Dropping the
/// transaction on any error rolls both back.
fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    let version = migration.version;
    info!(version, description = migration.description, "applying migration");

    let result = (|| -> StoreResult<()> {
        let tx = conn
            .unchecked_transaction()
            .map_err(failed(version, "begin"))?;
        tx.execute_batch(migration.sql)
            .map_err(failed(version, "execute"))?;
        tx.execute(
            "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![version, migration.description, chrono::Utc::now().timestamp()],
        )
        .map_err(failed(version, "record"))?;
        tx.commit().map_err(failed(version, "commit"))
    })();

    if let Err(err) = &result {
        warn!(version, %err, "migration rolled back");
    }
    result
}

// ── tests ────────────────────────────────────────────────────────────
