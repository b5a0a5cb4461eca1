//! Outbound directory synchronization for Rust.
//!
//! Pushes locally managed users and groups into an external directory and keeps
//! the remote records consistent with the local source of truth.
//!
//! # Core Components
//!
//! - [`SyncClient`] - per-object `write` / `delete` reconciliation
//! - [`SchemaBuilder`] - turns an object into the directory's schema via property mappings
//! - [`LinkStore`] - `(provider, object) -> external id` table, in memory or SQLite
//! - [`DirectoryClient`] - transport boundary, with an HTTP implementation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use directory_sync::{HttpDirectoryClient, HttpDirectoryConfig, SyncClient};
//! use directory_sync::object::LocalUser;
//! use directory_sync::provider::{PropertyMapping, Provider};
//! use directory_sync::storage::SqliteLinkStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = Provider::new("google", "Google Workspace").with_mapping(PropertyMapping::user(
//!     "10-name",
//!     r#"#{ name: #{ fullName: object.name } }"#,
//! ));
//! let directory = HttpDirectoryClient::new(
//!     HttpDirectoryConfig::new("https://directory.example.com/v1", "users")
//!         .with_bearer_token("token"),
//! )?;
//! let links = SqliteLinkStore::new_with_path("sync_data/links.db").await?;
//!
//! let client = SyncClient::builder(provider, directory, links).build()?;
//! client
//!     .write(&LocalUser::new("42", "jane", "jane@example.com").with_name("Jane Doe"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod locks;
pub mod mapping;
pub mod object;
pub mod provider;
pub mod retry;
pub mod schema;
pub mod storage;
pub mod sync_client;

// Re-export commonly used types for convenience
pub use config::{ConfigError, DeleteAction, EvaluatorLimits, SyncConfig};
pub use directory::{DirectoryClient, DirectoryError, HttpDirectoryClient, HttpDirectoryConfig};
pub use error::{IntegrityError, StopReason, StopSync, SyncError, SyncResult};
pub use events::{ChannelEventSink, EventAction, EventSink, LogEventSink, SyncEvent};
pub use locks::ObjectLocks;
pub use mapping::{MappingError, MappingEvaluator, RhaiMappingEvaluator};
pub use object::{LocalGroup, LocalUser, ObjectKind, ObjectSnapshot, SyncObject};
pub use provider::{MappingKind, PropertyMapping, Provider};
pub use retry::RetryPolicy;
pub use schema::{ExternalDocument, SchemaBuilder};
pub use storage::{InMemoryLinkStore, LinkKey, LinkRecord, LinkStore, LinkStoreError, SqliteLinkStore};
pub use sync_client::{SyncClient, SyncClientBuilder};
