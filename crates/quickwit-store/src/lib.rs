//! # quickwit-store
//!
//! Durable storage for QuickWit events.
//!
//! Provides SQLite-backed persistence (WAL mode, foreign keys on) for
//! events, their registrations, and per-user timezone preferences. This
//! tier is the only source of truth; the in-memory mirror lives in
//! `quickwit-core` and is never authoritative.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  EventStore     (events + registrations) │
//! │  TimezoneStore  (user_timezones)         │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL, spawn_blocking) │
//! │  Migrations (versioned, transactional)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use quickwit_store::{Database, EventStore};
//!
//! let db = Database::open_and_migrate("data/events.db").await?;
//! let events = EventStore::new(db.clone());
//! let ended = events.query_ended(chrono::Utc::now()).await?;
//! ```

pub mod db;
pub mod error;
pub mod event_store;
pub mod migration;
pub mod model;
pub mod timezone_store;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use event_store::EventStore;
pub use model::{EndedEvent, Event, EventType, JOB_TAXONOMY, Registration, Status};
pub use timezone_store::TimezoneStore;
