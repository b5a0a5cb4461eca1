//! Link table: which directory record represents which local object.
//!
//! A link maps `(provider, object kind, local reference)` to the external id
//! the directory assigned. The table is the single source of truth for the sync
//! client; there is never more than one link per key.
//!
//! The [`LinkStore`] trait is a small repository interface with two backends:
//!
//! - [`InMemoryLinkStore`] for tests and embedded use
//! - [`SqliteLinkStore`] for persistence across restarts
//!
//! # Example Usage
//!
//! ```rust
//! use directory_sync::object::ObjectKind;
//! use directory_sync::storage::{InMemoryLinkStore, LinkKey, LinkRecord, LinkStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryLinkStore::new();
//! let key = LinkKey::new("google", ObjectKind::User, "42");
//!
//! store.insert(LinkRecord::new(key.clone(), "jane@example.com")).await?;
//! assert!(store.insert(LinkRecord::new(key.clone(), "other")).await.is_err());
//!
//! let link = store.find(&key).await?.unwrap();
//! assert_eq!(link.external_id, "jane@example.com");
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod in_memory;
pub mod sqlite;


pub use errors::LinkStoreError;
pub use in_memory::{InMemoryLinkStore, InMemoryLinkStoreStats};
pub use sqlite::SqliteLinkStore;

use crate::object::{ObjectKind, SyncObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

/// Identity of a link: provider, object kind and local object reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkKey {
    provider_id: String,
    kind: ObjectKind,
    object_ref: String,
}

impl LinkKey {
    pub fn new(
        provider_id: impl Into<String>,
        kind: ObjectKind,
        object_ref: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            kind,
            object_ref: object_ref.into(),
        }
    }

    /// Key for `object` under `provider_id`.
    pub fn for_object<O>(provider_id: impl Into<String>, object: &O) -> Self
    where
        O: SyncObject + ?Sized,
    {
        Self::new(provider_id, object.kind(), object.object_ref())
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn object_ref(&self) -> &str {
        &self.object_ref
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.provider_id, self.kind, self.object_ref)
    }
}

/// A stored link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub provider_id: String,
    pub object_kind: ObjectKind,
    pub object_ref: String,
    pub external_id: String,
    pub created_at: DateTime<Utc>,
}

impl LinkRecord {
    pub fn new(key: LinkKey, external_id: impl Into<String>) -> Self {
        Self {
            provider_id: key.provider_id,
            object_kind: key.kind,
            object_ref: key.object_ref,
            external_id: external_id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> LinkKey {
        LinkKey::new(&self.provider_id, self.object_kind, &self.object_ref)
    }
}

/// Repository for links.
///
/// Listing is ordered by object kind name then object reference so paging is
/// stable across backends.
pub trait LinkStore: Send + Sync {
    /// Look up the link for `key`.
    fn find(
        &self,
        key: &LinkKey,
    ) -> impl Future<Output = Result<Option<LinkRecord>, LinkStoreError>> + Send;

    /// Insert a new link.
    ///
    /// # Errors
    ///
    /// [`LinkStoreError::AlreadyLinked`] when a link exists for the same key. The
    /// existing link is left untouched.
    fn insert(
        &self,
        record: LinkRecord,
    ) -> impl Future<Output = Result<LinkRecord, LinkStoreError>> + Send;

    /// Insert or replace the link for the record's key.
    fn upsert(
        &self,
        record: LinkRecord,
    ) -> impl Future<Output = Result<LinkRecord, LinkStoreError>> + Send;

    /// Remove the link for `key`. Returns whether a link existed.
    fn delete(&self, key: &LinkKey) -> impl Future<Output = Result<bool, LinkStoreError>> + Send;

    fn exists(&self, key: &LinkKey) -> impl Future<Output = Result<bool, LinkStoreError>> + Send;

    /// Page through the links of one provider.
    fn list(
        &self,
        provider_id: &str,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<LinkRecord>, LinkStoreError>> + Send;

    fn count(&self, provider_id: &str)
    -> impl Future<Output = Result<usize, LinkStoreError>> + Send;

    /// Remove every link of every provider.
    fn clear(&self) -> impl Future<Output = Result<(), LinkStoreError>> + Send;
}
