//! In-memory event mirror using [`moka`].
//!
//! Entries are stored as JSON strings, so every read returns a fresh,
//! independent [`Event`] and no caller can mutate a cached value through
//! an alias. There is no capacity bound and no expiry: an entry lives
//! until the coordinator removes it.
//!
//! A miss means "unknown", never "does not exist". Only the coordinator
//! writes to the cache (the mutating methods are crate-private).

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use moka::future::Cache;
use quickwit_store::{Event, Registration};
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};

// ── cache stats ──────────────────────────────────────────────────────

/// Counters tracking cache effectiveness.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Total cache hits since creation.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Total cache misses since creation.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hit rate between 0.0 and 1.0 (0.0 if there were no lookups).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 {
            return 0.0;
        }
        self.hits() as f64 / total as f64
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} rate={:.2}%",
            self.hits(),
            self.misses(),
            self.hit_rate() * 100.0,
        )
    }
}

// ── event cache ──────────────────────────────────────────────────────

/// Write-through mirror of recently used events, keyed by channel id.
#[derive(Clone)]
pub struct EventCache {
    inner: Cache<u64, String>,
    stats: Arc<CacheStats>,
}

impl Default for EventCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EventCache {
    /// Create an unbounded cache without expiry.
    pub fn new() -> Self {
        debug!("event cache created");
        Self {
            inner: Cache::builder().build(),
            stats: Arc::new(CacheStats::default()),
        }
    }

    /// Look up a cached event. `None` is a miss, not evidence of absence.
    pub async fn get(&self, channel_id: u64) -> Option<Event> {
        let json = match self.inner.get(&channel_id).await {
            Some(json) => json,
            None => {
                self.stats.record_miss();
                debug!(channel_id, "cache miss");
                return None;
            }
        };

        match serde_json::from_str::<Event>(&json) {
            Ok(event) => {
                self.stats.record_hit();
                debug!(channel_id, "cache hit");
                Some(event)
            }
            Err(err) => {
                // Corrupted entry: evict and treat as a miss.
                warn!(channel_id, %err, "cache entry deserialization failed, evicting");
                self.inner.invalidate(&channel_id).await;
                self.stats.record_miss();
                None
            }
        }
    }

    /// Get a reference to the cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Store (or overwrite) a snapshot of `event`.
    ///
    /// If the snapshot cannot be encoded the previous entry is evicted, so
    /// the next read falls through to the store instead of serving stale
    /// data.
    pub(crate) async fn put(&self, event: &Event) -> CoreResult<()> {
        self.store_entry(event.channel_id, serde_json::to_string(event))
            .await
    }

    async fn store_entry(
        &self,
        channel_id: u64,
        encoded: serde_json::Result<String>,
    ) -> CoreResult<()> {
        match encoded {
            Ok(json) => {
                self.inner.insert(channel_id, json).await;
                debug!(channel_id, "cache insert");
                Ok(())
            }
            Err(err) => {
                warn!(channel_id, %err, "cache entry serialization failed, evicting");
                self.inner.invalidate(&channel_id).await;
                Err(CoreError::Cache(err.to_string()))
            }
        }
    }

    /// Drop an event from the cache. Removing an absent key is a no-op.
    pub(crate) async fn remove(&self, channel_id: u64) {
        self.inner.invalidate(&channel_id).await;
        debug!(channel_id, "cache invalidate");
    }

    /// Insert or overwrite a registration inside a cached event, keeping
    /// its position. Does nothing when the event is not cached.
    pub(crate) async fn upsert_registration(
        &self,
        channel_id: u64,
        registration: Registration,
    ) -> CoreResult<()> {
        if let Some(mut event) = self.peek(channel_id).await {
            event.upsert_registration(registration);
            self.put(&event).await?;
        }
        Ok(())
    }

    /// Remove a registration from a cached event. Does nothing when the
    /// event is not cached or the user is not registered.
    pub(crate) async fn remove_registration(&self, channel_id: u64, user_id: u64) -> CoreResult<()> {
        if let Some(mut event) = self.peek(channel_id).await {
            if event.remove_registration(user_id) {
                self.put(&event).await?;
            }
        }
        Ok(())
    }

    /// Read without touching the hit/miss counters.
    async fn peek(&self, channel_id: u64) -> Option<Event> {
        let json = self.inner.get(&channel_id).await?;
        serde_json::from_str(&json).ok()
    }
}

// ── tests ────────────────────────────────────────────────────────────
