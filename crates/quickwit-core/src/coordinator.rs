//! Event lifecycle coordination.
//!
//! [`EventCoordinator`] is the only writer of both tiers. Every mutation
//! follows the same sequence while holding the event's channel lock:
//!
//! 1. read the current event (cache, falling back to the store),
//! 2. write the store,
//! 3. write the cache, only if the store write succeeded,
//! 4. dispatch the signal.
//!
//! Validation and authorisation failures return before step 2, so a
//! rejected call never mutates anything. A store failure returns before
//! step 3, leaving the cache on the last committed state.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use quickwit_store::{
    Database, EndedEvent, Event, EventStore, Registration, StoreError, TimezoneStore,
};
use tracing::{debug, error, info, instrument, warn};

use crate::cache::EventCache;
use crate::config::CoordinatorConfig;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::locks::ChannelLocks;
use crate::query::EventQueries;
use crate::signal::{Signal, SignalDispatcher};
use crate::time_parse::parse_start;
use crate::timezone::lookup_timezone;
use crate::validation;

/// Fields for a new event, as primitive values from the command layer.
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub channel_id: u64,
    pub guild_id: u64,
    pub organiser_id: u64,
    /// Event type name; the configured default when `None`.
    pub event_type: Option<String>,
    pub name: String,
    pub description: String,
    /// Start time in the organiser's timezone, e.g. `24-12 20:00`.
    pub start: String,
    pub duration_minutes: Option<i64>,
    pub reminder_minutes: Option<i64>,
}

/// A partial update; `None` leaves the field as it is.
#[derive(Debug, Clone, Default)]
pub struct EventEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start: Option<String>,
    pub duration_minutes: Option<i64>,
    pub reminder_minutes: Option<i64>,
}

impl EventEdit {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.start.is_none()
            && self.duration_minutes.is_none()
            && self.reminder_minutes.is_none()
    }
}

/// Orchestrates event mutations across the store and the cache.
///
/// Cheaply cloneable; clones share the cache, the lock table and the
/// subscriber list.
#[derive(Clone)]
pub struct EventCoordinator {
    store: EventStore,
    timezones: TimezoneStore,
    cache: EventCache,
    queries: EventQueries,
    signals: SignalDispatcher,
    locks: ChannelLocks,
    config: CoordinatorConfig,
}

impl EventCoordinator {
    pub fn new(
        store: EventStore,
        timezones: TimezoneStore,
        cache: EventCache,
        signals: SignalDispatcher,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            queries: EventQueries::new(store.clone()),
            store,
            timezones,
            cache,
            signals,
            locks: ChannelLocks::new(),
            config,
        }
    }

    /// Build a coordinator over an already migrated database with an
    /// empty cache.
    pub fn with_database(
        db: Database,
        signals: SignalDispatcher,
        config: CoordinatorConfig,
    ) -> Self {
        Self::new(
            EventStore::new(db.clone()),
            TimezoneStore::new(db),
            EventCache::new(),
            signals,
            config,
        )
    }

    /// Read-only view of the cache (for stats and diagnostics).
    pub fn cache(&self) -> &EventCache {
        &self.cache
    }

    pub fn queries(&self) -> &EventQueries {
        &self.queries
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // ── reads ────────────────────────────────────────────────────────

    /// Fetch an event, or `None` when the channel hosts none.
    ///
    /// Cache hits are answered without locking. A miss is resolved under
    /// the channel lock so a repopulation can never overwrite a newer
    /// write-through value.
    #[instrument(skip(self))]
    pub async fn get(&self, channel_id: u64) -> CoreResult<Option<Event>> {
        if let Some(event) = self.cache.get(channel_id).await {
            return Ok(Some(event));
        }
        let _guard = self.locks.lock(channel_id).await;
        self.load(channel_id).await
    }

    /// Look up the event linked to an external scheduled event.
    #[instrument(skip(self))]
    pub async fn event_for_scheduled_event(
        &self,
        scheduled_event_id: u64,
    ) -> CoreResult<Option<Event>> {
        let channel_id = self
            .store
            .find_by_scheduled_event(scheduled_event_id)
            .await
            .map_err(|e| storage_failure("event_for_scheduled_event", scheduled_event_id, e))?;
        match channel_id {
            Some(channel_id) => self.get(channel_id).await,
            None => Ok(None),
        }
    }

    pub async fn due_reminders(&self, now: DateTime<Utc>) -> CoreResult<Vec<u64>> {
        self.queries.due_reminders(now).await
    }

    pub async fn ended_events(&self, now: DateTime<Utc>) -> CoreResult<Vec<EndedEvent>> {
        self.queries.ended_events(now).await
    }

    // ── lifecycle ────────────────────────────────────────────────────

    /// Validate and persist a new event, emitting `created`.
    pub async fn create(&self, new: NewEvent) -> CoreResult<Event> {
        self.create_at(new, Utc::now()).await
    }

    /// [`create`](Self::create) against an explicit clock.
    #[instrument(skip(self, new), fields(channel_id = new.channel_id))]
    pub async fn create_at(&self, new: NewEvent, now: DateTime<Utc>) -> CoreResult<Event> {
        validation::check_name(&new.name)?;
        validation::check_description(&new.description)?;
        let event_type = validation::parse_event_type(
            new.event_type
                .as_deref()
                .unwrap_or(self.config.default_event_type.as_str()),
        )?;
        let duration = new
            .duration_minutes
            .unwrap_or(self.config.default_duration_minutes);
        validation::check_duration(duration)?;
        let reminder = new
            .reminder_minutes
            .unwrap_or(self.config.default_reminder_minutes);
        validation::check_reminder(reminder)?;
        let start = self.parse_future_start(&new.start, new.organiser_id, now).await?;

        let utc_end = validation::end_after(start, duration)?;
        let reminder_at = validation::reminder_before(start, reminder)?;

        let event = Event {
            channel_id: new.channel_id,
            event_type,
            name: new.name,
            description: new.description,
            organiser_id: new.organiser_id,
            utc_start: start,
            utc_end,
            guild_id: new.guild_id,
            reminder_at,
            scheduled_event_id: None,
            registrations: Vec::new(),
        };

        let _guard = self.locks.lock(event.channel_id).await;
        if self.load(event.channel_id).await?.is_some() {
            return Err(ValidationError::ChannelInUse {
                channel_id: event.channel_id,
            }
            .into());
        }

        self.store
            .put(&event)
            .await
            .map_err(|e| storage_failure("create", event.channel_id, e))?;
        self.cache.put(&event).await?;

        info!(
            channel_id = event.channel_id,
            event_type = %event.event_type,
            start = %event.utc_start,
            "event created"
        );
        self.signals.dispatch(Signal::Created(event.clone()));
        Ok(event)
    }

    /// Apply a partial update on behalf of `actor_id`, emitting `altered`.
    ///
    /// A new start shifts the reminder and the end by the same amount,
    /// keeping the previous reminder offset and duration, unless the same
    /// edit overrides them explicitly.
    pub async fn edit(&self, channel_id: u64, actor_id: u64, edit: EventEdit) -> CoreResult<Event> {
        self.edit_at(channel_id, actor_id, edit, Utc::now()).await
    }

    /// [`edit`](Self::edit) against an explicit clock.
    #[instrument(skip(self, edit))]
    pub async fn edit_at(
        &self,
        channel_id: u64,
        actor_id: u64,
        edit: EventEdit,
        now: DateTime<Utc>,
    ) -> CoreResult<Event> {
        if let Some(name) = &edit.name {
            validation::check_name(name)?;
        }
        if let Some(description) = &edit.description {
            validation::check_description(description)?;
        }
        if let Some(minutes) = edit.duration_minutes {
            validation::check_duration(minutes)?;
        }
        if let Some(minutes) = edit.reminder_minutes {
            validation::check_reminder(minutes)?;
        }
        let new_start = match &edit.start {
            Some(input) => Some(self.parse_future_start(input, actor_id, now).await?),
            None => None,
        };

        let _guard = self.locks.lock(channel_id).await;
        let mut event = self
            .load(channel_id)
            .await?
            .ok_or(CoreError::NotFound { channel_id })?;
        if event.organiser_id != actor_id {
            return Err(CoreError::Unauthorized {
                channel_id,
                actor_id,
            });
        }
        if edit.is_empty() {
            return Ok(event);
        }

        let (utc_start, utc_end, reminder_at) = shifted_times(&event, new_start, &edit)?;
        event.utc_start = utc_start;
        event.utc_end = utc_end;
        event.reminder_at = reminder_at;
        if let Some(name) = edit.name {
            event.name = name;
        }
        if let Some(description) = edit.description {
            event.description = description;
        }

        self.store
            .put(&event)
            .await
            .map_err(|e| storage_failure("edit", channel_id, e))?;
        self.cache.put(&event).await?;

        info!(channel_id, start = %event.utc_start, "event altered");
        self.signals.dispatch(Signal::Altered(event.clone()));
        Ok(event)
    }

    /// Insert or update a registration, emitting `registrations_altered`.
    ///
    /// Re-registering with identical data changes nothing and emits no
    /// signal.
    #[instrument(skip(self, registration), fields(user_id = registration.user_id))]
    pub async fn register(&self, channel_id: u64, registration: Registration) -> CoreResult<Event> {
        let _guard = self.locks.lock(channel_id).await;
        let mut event = self
            .load(channel_id)
            .await?
            .ok_or(CoreError::NotFound { channel_id })?;
        let registration = validation::normalise_job(event.event_type, registration)?;

        if !event.upsert_registration(registration.clone()) {
            debug!(channel_id, user_id = registration.user_id, "registration unchanged");
            return Ok(event);
        }

        if let Err(err) = self.store.put_registration(channel_id, &registration).await {
            if let StoreError::NotFound { .. } = err {
                // The row vanished underneath a cached copy.
                warn!(channel_id, "event missing from store, evicting cache entry");
                self.cache.remove(channel_id).await;
                return Err(CoreError::NotFound { channel_id });
            }
            return Err(storage_failure("register", channel_id, err));
        }
        self.cache
            .upsert_registration(channel_id, registration)
            .await?;

        self.signals
            .dispatch(Signal::RegistrationsAltered(event.clone()));
        Ok(event)
    }

    /// Remove a user's registration, emitting `registrations_altered`.
    ///
    /// Returns `false` (and emits nothing) when the event does not exist
    /// or the user was not registered.
    #[instrument(skip(self))]
    pub async fn unregister(&self, channel_id: u64, user_id: u64) -> CoreResult<bool> {
        let _guard = self.locks.lock(channel_id).await;
        let Some(mut event) = self.load(channel_id).await? else {
            return Ok(false);
        };
        if !event.remove_registration(user_id) {
            return Ok(false);
        }

        self.store
            .delete_registration(channel_id, user_id)
            .await
            .map_err(|e| storage_failure("unregister", channel_id, e))?;
        self.cache.remove_registration(channel_id, user_id).await?;

        self.signals
            .dispatch(Signal::RegistrationsAltered(event));
        Ok(true)
    }

    /// Remove an event from both tiers, emitting `deleted`.
    ///
    /// Returns the last committed snapshot, or `None` if there was
    /// nothing to delete.
    #[instrument(skip(self))]
    pub async fn delete(&self, channel_id: u64) -> CoreResult<Option<Event>> {
        self.remove_event(channel_id, None).await
    }

    /// Delete every event that ended at or before now.
    pub async fn prune(&self) -> CoreResult<usize> {
        self.prune_at(Utc::now()).await
    }

    /// [`prune`](Self::prune) against an explicit clock.
    ///
    /// Events that disappear, or are moved later, between the scan and
    /// their turn are skipped. The first storage failure aborts the run;
    /// events already pruned stay pruned.
    #[instrument(skip(self))]
    pub async fn prune_at(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let ended = self.queries.ended_events(now).await.inspect_err(|err| {
            error!(%err, "prune scan failed");
        })?;

        let mut pruned = 0;
        for candidate in ended {
            match self.remove_event(candidate.channel_id, Some(now)).await? {
                Some(_) => pruned += 1,
                None => debug!(channel_id = candidate.channel_id, "already gone, skipping"),
            }
        }

        if pruned > 0 {
            info!(pruned, "pruned ended events");
        }
        Ok(pruned)
    }

    /// Unregister a user who left the community from every event.
    ///
    /// Returns the channels whose registrations changed.
    #[instrument(skip(self))]
    pub async fn remove_member(&self, user_id: u64) -> CoreResult<Vec<u64>> {
        let channel_ids = self
            .store
            .registered_event_ids(user_id)
            .await
            .map_err(|e| storage_failure("remove_member", user_id, e))?;

        let mut affected = Vec::with_capacity(channel_ids.len());
        for channel_id in channel_ids {
            if self.unregister(channel_id, user_id).await? {
                affected.push(channel_id);
            }
        }
        Ok(affected)
    }

    /// Record (or clear) the external scheduled event mirroring this one.
    ///
    /// Emits no signal: the caller is the collaborator that reacted to
    /// one.
    #[instrument(skip(self))]
    pub async fn link_scheduled_event(
        &self,
        channel_id: u64,
        scheduled_event_id: Option<u64>,
    ) -> CoreResult<Event> {
        let _guard = self.locks.lock(channel_id).await;
        let mut event = self
            .load(channel_id)
            .await?
            .ok_or(CoreError::NotFound { channel_id })?;
        if event.scheduled_event_id == scheduled_event_id {
            return Ok(event);
        }

        let updated = self
            .store
            .set_scheduled_event_id(channel_id, scheduled_event_id)
            .await
            .map_err(|e| storage_failure("link_scheduled_event", channel_id, e))?;
        if !updated {
            self.cache.remove(channel_id).await;
            return Err(CoreError::NotFound { channel_id });
        }

        event.scheduled_event_id = scheduled_event_id;
        self.cache.put(&event).await?;
        debug!(channel_id, ?scheduled_event_id, "scheduled event linked");
        Ok(event)
    }

    // ── timezones ────────────────────────────────────────────────────

    /// Set a user's timezone, returning the canonical zone.
    #[instrument(skip(self))]
    pub async fn set_timezone(&self, user_id: u64, name: &str) -> CoreResult<Tz> {
        let tz = lookup_timezone(name)
            .ok_or_else(|| ValidationError::UnknownTimezone(name.to_string()))?;
        self.timezones
            .set(user_id, tz.name())
            .await
            .map_err(|e| storage_failure("set_timezone", user_id, e))?;
        info!(user_id, timezone = tz.name(), "user timezone set");
        Ok(tz)
    }

    /// The user's timezone, UTC when none is stored.
    pub async fn timezone(&self, user_id: u64) -> CoreResult<Tz> {
        let stored = self
            .timezones
            .get(user_id)
            .await
            .map_err(|e| storage_failure("timezone", user_id, e))?;
        let Some(name) = stored else {
            return Ok(Tz::UTC);
        };
        Ok(lookup_timezone(&name).unwrap_or_else(|| {
            warn!(user_id, timezone = %name, "stored timezone not recognised, using UTC");
            Tz::UTC
        }))
    }

    // ── internals ────────────────────────────────────────────────────

    /// Read through the cache, repopulating it on a miss.
    ///
    /// Callers must hold the channel lock.
    async fn load(&self, channel_id: u64) -> CoreResult<Option<Event>> {
        if let Some(event) = self.cache.get(channel_id).await {
            return Ok(Some(event));
        }
        let stored = self
            .store
            .get(channel_id)
            .await
            .map_err(|e| storage_failure("load", channel_id, e))?;
        let Some(event) = stored else {
            return Ok(None);
        };
        self.cache.put(&event).await?;
        Ok(Some(event))
    }

    /// Delete under the channel lock. With `ended_by`, an event whose end
    /// has moved past that instant is left alone.
    async fn remove_event(
        &self,
        channel_id: u64,
        ended_by: Option<DateTime<Utc>>,
    ) -> CoreResult<Option<Event>> {
        let _guard = self.locks.lock(channel_id).await;
        let Some(event) = self.load(channel_id).await? else {
            return Ok(None);
        };
        if let Some(now) = ended_by {
            if event.utc_end > now {
                debug!(channel_id, "event rescheduled since scan, not pruning");
                return Ok(None);
            }
        }

        self.store
            .delete(channel_id)
            .await
            .map_err(|e| storage_failure("delete", channel_id, e))?;
        self.cache.remove(channel_id).await;

        info!(channel_id, "event deleted");
        self.signals.dispatch(Signal::Deleted(event.clone()));
        Ok(Some(event))
    }

    async fn parse_future_start(
        &self,
        input: &str,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> CoreResult<DateTime<Utc>> {
        let tz = self.timezone(user_id).await?;
        let start = parse_start(input, tz, now)?;
        if start < now {
            return Err(ValidationError::StartInPast.into());
        }
        Ok(start)
    }
}

/// The start, end and reminder of `event` after an edit.
///
/// A new start carries the previous reminder offset and length along;
/// explicit duration or reminder minutes then override them.
fn shifted_times(
    event: &Event,
    new_start: Option<DateTime<Utc>>,
    edit: &EventEdit,
) -> Result<(DateTime<Utc>, DateTime<Utc>, DateTime<Utc>), ValidationError> {
    let (start, mut end, mut reminder) = match new_start {
        Some(start) => (
            start,
            start
                .checked_add_signed(event.utc_end - event.utc_start)
                .ok_or(ValidationError::DurationOutOfRange {
                    min: validation::MIN_EVENT_DURATION_MINUTES,
                    max: validation::MAX_EVENT_DURATION_MINUTES,
                })?,
            start
                .checked_sub_signed(event.utc_start - event.reminder_at)
                .ok_or(ValidationError::ReminderOutOfRange)?,
        ),
        None => (event.utc_start, event.utc_end, event.reminder_at),
    };
    if let Some(minutes) = edit.duration_minutes {
        end = validation::end_after(start, minutes)?;
    }
    if let Some(minutes) = edit.reminder_minutes {
        reminder = validation::reminder_before(start, minutes)?;
    }
    Ok((start, end, reminder))
}

fn storage_failure(operation: &'static str, key: u64, err: StoreError) -> CoreError {
    error!(operation, key, %err, "storage failure");
    CoreError::Storage(err)
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
