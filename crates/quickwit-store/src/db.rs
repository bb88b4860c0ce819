//! Shared SQLite handle for the event, registration and timezone stores.
//!
//! One connection sits behind a mutex and every statement runs on tokio's
//! blocking pool. Foreign keys are switched on per connection, since the
//! registration cascade depends on them.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::migration;

/// How long a writer waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable handle; clones share the one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file, creating missing parent
    /// directories. Blocking; prefer [`Database::open_and_migrate`] from
    /// async code.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening event database");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::InvalidArgument(format!(
                    "cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path)?;
        let journal: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !journal.eq_ignore_ascii_case("wal") {
            warn!(path = %path.display(), %journal, "WAL unavailable, readers will block writers");
        }
        Self::configure(conn)
    }

    /// A private in-memory database. Nothing survives the last clone.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory event database");
        Self::configure(Connection::open_in_memory()?)
    }

    /// Open the file and bring its schema up to date.
    pub async fn open_and_migrate(path: impl AsRef<Path> + Send + 'static) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = tokio::task::spawn_blocking(move || Self::open(&path)).await??;
        let version = db.run_migrations().await?;
        info!(schema_version = version, "event database ready");
        Ok(db)
    }

    pub async fn in_memory_migrated() -> StoreResult<Self> {
        let db = Self::open_in_memory()?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Apply pending migrations, returning the resulting schema version.
    pub async fn run_migrations(&self) -> StoreResult<u32> {
        self.execute(|conn| migration::run_all(conn)).await
    }

    /// The schema version recorded in the database.
    pub async fn schema_version(&self) -> StoreResult<u32> {
        self.execute(|conn| migration::current_version(conn)).await
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.execute_mut(move |conn| f(&*conn)).await
    }

    /// Like [`Database::execute`], with `&mut` access for
    /// `Connection::transaction`.
    pub async fn execute_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::TaskJoin(format!("connection mutex poisoned: {e}")))?;
            f(&mut conn)
        })
        .await?
    }

    fn configure(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "mmap_size", 67_108_864_i64)?;
        // KiB when negative.
        conn.pragma_update(None, "cache_size", -16_000_i32)?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        debug!("connection configured");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

// ── id conversion ────────────────────────────────────────────────────

/// Convert a platform snowflake into the signed integer SQLite stores.
pub(crate) fn id_to_sql(id: u64) -> StoreResult<i64> {
    i64::try_from(id).map_err(|_| StoreError::InvalidArgument(format!("id {id} exceeds i64")))
}

/// Convert a stored integer back into a platform snowflake.
pub(crate) fn id_from_sql(table: &'static str, value: i64) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::CorruptRow {
        table,
        reason: format!("negative id {value}"),
    })
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn pragma(db: &Database, name: &'static str) -> String {
        db.execute(move |conn| {
            let value: rusqlite::types::Value =
                conn.query_row(&format!("PRAGMA {name}"), [], |row| row.get(0))?;
            Ok(match value {
                rusqlite::types::Value::Integer(i) => i.to_string(),
                rusqlite::types::Value::Text(s) => s,
                other => format!("{other:?}"),
            })
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn file_database_uses_wal_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("events.db");

        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(pragma(&db, "journal_mode").await, "wal");
        assert_eq!(pragma(&db, "foreign_keys").await, "1");
        assert_eq!(pragma(&db, "busy_timeout").await, "5000");
    }

    #[tokio::test]
    async fn in_memory_database_enforces_foreign_keys() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(pragma(&db, "foreign_keys").await, "1");
    }

    #[tokio::test]
    async fn schema_version_tracks_migrations() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.schema_version().await.is_err());

        let applied = db.run_migrations().await.unwrap();
        assert_eq!(applied, migration::latest_version());
        assert_eq!(db.schema_version().await.unwrap(), applied);

        let count: i64 = db
            .execute(|conn| Ok(conn.query_row("SELECT count(*) FROM events", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn reopening_a_newer_database_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        {
            let db = Database::open_and_migrate(path.clone()).await.unwrap();
            db.execute(|conn| {
                conn.execute(
                    "INSERT INTO _migrations (version, description, applied_at) \
                     VALUES (99, 'from a newer build', 0)",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        }

        let err = Database::open_and_migrate(path).await.err().unwrap();
        assert!(matches!(err, StoreError::Migration { version: 99, .. }), "{err:?}");
    }

    #[test]
    fn id_conversion_bounds() {
        assert_eq!(id_to_sql(42).unwrap(), 42);
        assert!(id_to_sql(u64::MAX).is_err());
        assert_eq!(id_from_sql("events", 7).unwrap(), 7);
        assert!(matches!(
            id_from_sql("events", -1),
            Err(StoreError::CorruptRow { table: "events", .. })
        ));
    }
}
