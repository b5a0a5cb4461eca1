//! Link store wrapper that can be told to fail.

use directory_sync::storage::{InMemoryLinkStore, LinkKey, LinkRecord, LinkStore, LinkStoreError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct Faults {
    finds: AtomicBool,
    inserts: AtomicBool,
    deletes: AtomicBool,
    /// Another writer links the same key right before each insert.
    competing_inserts: AtomicBool,
}

/// [`InMemoryLinkStore`] with switchable failures. Clones share state.
#[derive(Clone, Default)]
pub struct FaultyLinkStore {
    inner: InMemoryLinkStore,
    faults: Arc<Faults>,
}

impl FaultyLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_finds(&self, fail: bool) {
        self.faults.finds.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.faults.inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.faults.deletes.store(fail, Ordering::SeqCst);
    }

    pub fn compete_on_insert(&self, compete: bool) {
        self.faults.competing_inserts.store(compete, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, operation: &str) -> Result<(), LinkStoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(LinkStoreError::internal(format!("{} failed: disk I/O error", operation)))
        } else {
            Ok(())
        }
    }
}

impl LinkStore for FaultyLinkStore {
    async fn find(&self, key: &LinkKey) -> Result<Option<LinkRecord>, LinkStoreError> {
        if self.faults.finds.load(Ordering::SeqCst) {
            return Err(LinkStoreError::unavailable("database is locked"));
        }
        self.inner.find(key).await
    }

    async fn insert(&self, record: LinkRecord) -> Result<LinkRecord, LinkStoreError> {
        Self::check(&self.faults.inserts, "insert")?;
        if self.faults.competing_inserts.load(Ordering::SeqCst) {
            self.inner
                .upsert(LinkRecord::new(record.key(), "competing-writer"))
                .await?;
        }
        self.inner.insert(record).await
    }

    async fn upsert(&self, record: LinkRecord) -> Result<LinkRecord, LinkStoreError> {
        Self::check(&self.faults.inserts, "upsert")?;
        self.inner.upsert(record).await
    }

    async fn delete(&self, key: &LinkKey) -> Result<bool, LinkStoreError> {
        Self::check(&self.faults.deletes, "delete")?;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &LinkKey) -> Result<bool, LinkStoreError> {
        self.inner.exists(key).await
    }

    async fn list(&self, provider_id: &str, offset: usize, limit: usize) -> Result<Vec<LinkRecord>, LinkStoreError> {
        self.inner.list(provider_id, offset, limit).await
    }

    async fn count(&self, provider_id: &str) -> Result<usize, LinkStoreError> {
        self.inner.count(provider_id).await
    }

    async fn clear(&self) -> Result<(), LinkStoreError> {
        self.inner.clear().await
    }
}
