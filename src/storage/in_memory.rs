//! In-memory link table.
//!
//! Thread-safe through a tokio `RwLock`; links are grouped by provider so
//! per-provider listing and counting do not scan other providers. Cloning the
//! store shares the underlying table.

use crate::object::ObjectKind;
use crate::storage::{LinkKey, LinkRecord, LinkStore, LinkStoreError};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

type ProviderLinks = HashMap<(ObjectKind, String), LinkRecord>;

/// In-memory [`LinkStore`].
#[derive(Clone, Default)]
pub struct InMemoryLinkStore {
    // Structure: provider_id -> (kind, object_ref) -> link
    links: Arc<RwLock<HashMap<String, ProviderLinks>>>,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get storage statistics for debugging and monitoring.
    pub async fn stats(&self) -> InMemoryLinkStoreStats {
        let guard = self.links.read().await;
        InMemoryLinkStoreStats {
            provider_count: guard.values().filter(|links| !links.is_empty()).count(),
            total_links: guard.values().map(HashMap::len).sum(),
        }
    }

    fn slot(key: &LinkKey) -> (ObjectKind, String) {
        (key.kind(), key.object_ref().to_string())
    }
}

/// Statistics about in-memory link table usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryLinkStoreStats {
    pub provider_count: usize,
    pub total_links: usize,
}

impl LinkStore for InMemoryLinkStore {
    async fn find(&self, key: &LinkKey) -> Result<Option<LinkRecord>, LinkStoreError> {
        let guard = self.links.read().await;
        Ok(guard
            .get(key.provider_id())
            .and_then(|links| links.get(&Self::slot(key)))
            .cloned())
    }

    async fn insert(&self, record: LinkRecord) -> Result<LinkRecord, LinkStoreError> {
        let key = record.key();
        let mut guard = self.links.write().await;
        let links = guard.entry(record.provider_id.clone()).or_default();
        match links.entry(Self::slot(&key)) {
            Entry::Occupied(existing) => Err(LinkStoreError::already_linked(
                key,
                Some(existing.get().external_id.clone()),
            )),
            Entry::Vacant(slot) => Ok(slot.insert(record).clone()),
        }
    }

    async fn upsert(&self, record: LinkRecord) -> Result<LinkRecord, LinkStoreError> {
        let slot = Self::slot(&record.key());
        let mut guard = self.links.write().await;
        guard
            .entry(record.provider_id.clone())
            .or_default()
            .insert(slot, record.clone());
        Ok(record)
    }

    async fn delete(&self, key: &LinkKey) -> Result<bool, LinkStoreError> {
        let mut guard = self.links.write().await;
        let removed = match guard.get_mut(key.provider_id()) {
            Some(links) => links.remove(&Self::slot(key)).is_some(),
            None => false,
        };
        if guard
            .get(key.provider_id())
            .is_some_and(|links| links.is_empty())
        {
            guard.remove(key.provider_id());
        }
        Ok(removed)
    }

    async fn exists(&self, key: &LinkKey) -> Result<bool, LinkStoreError> {
        let guard = self.links.read().await;
        Ok(guard
            .get(key.provider_id())
            .is_some_and(|links| links.contains_key(&Self::slot(key))))
    }

    async fn list(
        &self,
        provider_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LinkRecord>, LinkStoreError> {
        let guard = self.links.read().await;
        let Some(links) = guard.get(provider_id) else {
            return Ok(Vec::new());
        };

        let mut records: Vec<&LinkRecord> = links.values().collect();
        records.sort_by(|a, b| {
            a.object_kind
                .as_str()
                .cmp(b.object_kind.as_str())
                .then_with(|| a.object_ref.cmp(&b.object_ref))
        });

        Ok(records
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, provider_id: &str) -> Result<usize, LinkStoreError> {
        let guard = self.links.read().await;
        Ok(guard.get(provider_id).map(HashMap::len).unwrap_or(0))
    }

    async fn clear(&self) -> Result<(), LinkStoreError> {
        self.links.write().await.clear();
        Ok(())
    }
}
