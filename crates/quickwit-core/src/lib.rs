//! QuickWit event lifecycle.
//!
//! This crate sits between the command layer and `quickwit-store`:
//!
//! - **[`coordinator`]** -- [`EventCoordinator`], the only writer of
//!   events. Serialises mutations per channel, writes the store then the
//!   cache, and publishes a [`Signal`] for each change.
//! - **[`cache`]** -- Write-through [`moka`] mirror of events, returning
//!   independent copies on every read.
//! - **[`query`]** -- Ended-event and due-reminder range queries.
//! - **[`signal`]** -- Typed lifecycle signals and their ordered,
//!   synchronous dispatcher.
//! - **[`time_parse`]**, **[`validation`]**, **[`timezone`]** -- Input
//!   checks applied before anything is written.
//! - **[`error`]** -- [`CoreError`] and the user-facing [`ValidationError`].
//!
//! All public types are `Send + Sync` and meant to be shared across a
//! multi-threaded tokio runtime.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
mod locks;
pub mod query;
pub mod signal;
pub mod time_parse;
pub mod timezone;
pub mod validation;

pub use cache::{CacheStats, EventCache};
pub use config::CoordinatorConfig;
pub use coordinator::{EventCoordinator, EventEdit, NewEvent};
pub use error::{CoreError, CoreResult, ValidationError};
pub use query::EventQueries;
pub use signal::{Signal, SignalDispatcher, SignalKind, SignalSubscriber};
