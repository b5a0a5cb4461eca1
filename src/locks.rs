//! Per-object serialization for callers that may sync the same object twice
//! at once.
//!
//! The sync client assumes writes for one object are not concurrent. Callers
//! driven by change notifications can hold an [`ObjectLocks`] guard around each
//! `write` / `delete` to guarantee that.

use crate::storage::LinkKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A set of async mutexes keyed by link key.
#[derive(Debug, Clone, Default)]
pub struct ObjectLocks {
    locks: Arc<Mutex<HashMap<LinkKey, Arc<AsyncMutex<()>>>>>,
}

/// Held while an object is being synced. Dropping it releases the object.
#[derive(Debug)]
pub struct ObjectGuard {
    key: LinkKey,
    _guard: OwnedMutexGuard<()>,
}

impl ObjectGuard {
    pub fn key(&self) -> &LinkKey {
        &self.key
    }
}

impl ObjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other task holds `key`, then hold it.
    pub async fn acquire(&self, key: LinkKey) -> ObjectGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Entries nobody holds or waits on are only referenced by the map.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.clone()).or_default().clone()
        };
        ObjectGuard {
            key,
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of keys currently tracked, including ones about to be pruned.
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
