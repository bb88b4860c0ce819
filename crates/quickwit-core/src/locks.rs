//! Per-channel mutual exclusion.
//!
//! Read-modify-write sequences on one event are serialized by holding
//! that channel's lock; operations on different channels never contend.
//! Entries are created on demand and dropped as soon as nobody holds or
//! waits on them, so the table stays as small as the set of in-flight
//! operations.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed async locks, one per channel id.
#[derive(Clone, Default)]
pub(crate) struct ChannelLocks {
    inner: Arc<DashMap<u64, Arc<Mutex<()>>>>,
}

impl ChannelLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `channel_id`.
    pub(crate) async fn lock(&self, channel_id: u64) -> ChannelGuard {
        // Clone the mutex out before awaiting so no shard lock is held
        // across the await point.
        let mutex = Arc::clone(self.inner.entry(channel_id).or_default().value());
        let guard = mutex.lock_owned().await;
        ChannelGuard {
            channel_id,
            locks: Arc::clone(&self.inner),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Exclusive access to one channel; released on drop.
pub(crate) struct ChannelGuard {
    channel_id: u64,
    locks: Arc<DashMap<u64, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        // Release first so our own reference no longer counts.
        self.guard.take();
        // Only the table's reference left: nobody holds or awaits it.
        self.locks
            .remove_if(&self.channel_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

// ── tests ────────────────────────────────────────────────────────────
