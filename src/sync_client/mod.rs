//! Per-object reconciliation against the directory.
//!
//! [`SyncClient::write`] makes the directory reflect a local object and
//! [`SyncClient::delete`] removes it again. Both start from the link table,
//! which decides the branch:
//!
//! | link | write | delete |
//! |------|-------|--------|
//! | none | create, adopting on `ObjectExists` | nothing to do |
//! | present | update, recreating on `NotFound` | delete (or suspend), `NotFound` is success |
//!
//! Every remote mutation that succeeded is mirrored in the link table by a
//! spawned task, so the local write finishes even when the caller drops the
//! future. When that local write fails the result is an [`IntegrityError`]:
//! nothing is rolled back remotely, the divergence is logged, recorded as an
//! event and returned.

mod builder;

pub use builder::SyncClientBuilder;

use crate::config::{DeleteAction, SyncConfig};
use crate::directory::{DirectoryClient, DirectoryError};
use crate::error::{IntegrityError, RemoteOperation, StopReason, StopSync, SyncError, SyncResult};
use crate::events::{EventAction, EventSink, SyncEvent, TransientLogLimiter};
use crate::object::{ObjectSnapshot, SyncObject};
use crate::provider::Provider;
use crate::schema::{ExternalDocument, SchemaBuilder, validate_addresses};
use crate::storage::{LinkKey, LinkRecord, LinkStore, LinkStoreError};
use log::{debug, error, info, warn};
use serde_json::{Value, json};
use std::sync::Arc;

/// External id reported when a create succeeded but its id is unknown.
const UNKNOWN_EXTERNAL_ID: &str = "<unknown>";

/// Synchronizes objects of one provider into one directory collection.
///
/// Cheap to share behind an `Arc`; distinct objects may be synced concurrently.
/// Calls for the same object must not overlap; see
/// [`ObjectLocks`](crate::locks::ObjectLocks).
pub struct SyncClient<D, L> {
    provider: Arc<Provider>,
    directory: D,
    links: L,
    schema: SchemaBuilder,
    events: Arc<dyn EventSink>,
    config: Arc<SyncConfig>,
    transient_log: Arc<TransientLogLimiter>,
}

impl<D, L> SyncClient<D, L>
where
    D: DirectoryClient,
    L: LinkStore + Clone + 'static,
{
    pub fn builder(provider: Provider, directory: D, links: L) -> SyncClientBuilder<D, L> {
        SyncClientBuilder::new(provider, directory, links)
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn links(&self) -> &L {
        &self.links
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Make the directory reflect `object`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Transient`] when the directory is unavailable; the link
    ///   table is unchanged and the call can be retried
    /// - [`SyncError::StopSync`] for mapping, address and rejected-request failures
    /// - [`SyncError::Integrity`] when the directory changed but the link write failed
    /// - [`SyncError::Storage`] when the link lookup failed
    pub async fn write<O>(&self, object: &O) -> SyncResult<()>
    where
        O: SyncObject + ?Sized,
    {
        let key = LinkKey::for_object(&self.provider.id, object);
        let link = self.links.find(&key).await?;
        let document = self.prepare(object).await?;

        let Some(link) = link else {
            return self.create(object, key, &document).await;
        };

        match self.directory.update(&link.external_id, &document).await {
            Ok(()) => {
                debug!(
                    "Updated {} '{}' as '{}' for provider {}",
                    object.kind(),
                    object.object_ref(),
                    link.external_id,
                    self.provider.id
                );
                Ok(())
            }
            Err(DirectoryError::NotFound { .. }) => {
                info!(
                    "{} '{}' no longer exists as '{}' for provider {}, recreating",
                    object.kind(),
                    object.object_ref(),
                    link.external_id,
                    self.provider.id
                );
                self.links.delete(&key).await?;
                self.create(object, key, &document).await
            }
            Err(err) => Err(self.directory_failure(object, RemoteOperation::Update, err)),
        }
    }

    /// Remove `object` from the directory and forget its link.
    ///
    /// Objects that were never linked are left alone without any remote call.
    /// With [`DeleteAction::Suspend`] the remote object is updated with the
    /// configured suspended flag instead of being deleted.
    pub async fn delete<O>(&self, object: &O) -> SyncResult<()>
    where
        O: SyncObject + ?Sized,
    {
        let key = LinkKey::for_object(&self.provider.id, object);
        let Some(link) = self.links.find(&key).await? else {
            debug!(
                "{} '{}' has no link for provider {}, nothing to delete",
                object.kind(),
                object.object_ref(),
                self.provider.id
            );
            return Ok(());
        };

        let (operation, result) = match self.config.delete_action {
            DeleteAction::Delete => (
                RemoteOperation::Delete,
                self.directory.delete(&link.external_id).await,
            ),
            DeleteAction::Suspend => {
                let mut document = self.prepare(object).await?;
                document.insert(self.config.suspended_field.clone(), Value::Bool(true));
                (
                    RemoteOperation::Suspend,
                    self.directory.update(&link.external_id, &document).await,
                )
            }
        };

        match result {
            Ok(()) => info!(
                "Remote {} of {} '{}' ('{}') for provider {}",
                operation,
                object.kind(),
                object.object_ref(),
                link.external_id,
                self.provider.id
            ),
            Err(DirectoryError::NotFound { .. }) => debug!(
                "{} '{}' ('{}') already gone from provider {}",
                object.kind(),
                object.object_ref(),
                link.external_id,
                self.provider.id
            ),
            Err(err) => return Err(self.directory_failure(object, operation, err)),
        }

        self.commit_unlink(key, link.external_id, operation).await
    }

    /// Build the document and validate its addresses before any remote call.
    ///
    /// Mapping evaluation runs on the blocking pool; an expression may use its
    /// whole time limit.
    async fn prepare<O>(&self, object: &O) -> SyncResult<ExternalDocument>
    where
        O: SyncObject + ?Sized,
    {
        let snapshot = ObjectSnapshot::of(object);
        let schema = self.schema.clone();
        let provider = self.provider.clone();
        let document = tokio::task::spawn_blocking(move || schema.build(&snapshot, &provider))
            .await
            .map_err(|join| {
                let stop = StopSync::new(
                    StopReason::MappingFailed,
                    object.kind(),
                    object.object_ref(),
                    format!("mapping evaluation task failed: {}", join),
                );
                self.stop(stop, json!({ "kind": object.kind().as_str() }))
            })??;

        if let Err(invalid) = validate_addresses(&document, &self.config, &self.provider) {
            return Err(self.stop(
                StopSync::new(
                    StopReason::InvalidAddress,
                    object.kind(),
                    object.object_ref(),
                    invalid.to_string(),
                ),
                json!({ "field": invalid.field, "address": invalid.address }),
            ));
        }
        Ok(document)
    }

    async fn create<O>(&self, object: &O, key: LinkKey, document: &ExternalDocument) -> SyncResult<()>
    where
        O: SyncObject + ?Sized,
    {
        match self.directory.create(document).await {
            Ok(external_id) => {
                info!(
                    "Created {} '{}' as '{}' for provider {}",
                    object.kind(),
                    object.object_ref(),
                    external_id,
                    self.provider.id
                );
                self.commit_link(key, external_id, RemoteOperation::Create).await
            }
            Err(DirectoryError::ObjectExists { .. }) => {
                let external_id = object.canonical_address().to_string();
                info!(
                    "{} '{}' already exists for provider {}, adopting as '{}'",
                    object.kind(),
                    object.object_ref(),
                    self.provider.id,
                    external_id
                );
                self.commit_link(key, external_id, RemoteOperation::Adopt).await
            }
            Err(DirectoryError::CreatedWithoutId { message }) => Err(self.integrity_failure(
                key,
                RemoteOperation::Create,
                UNKNOWN_EXTERNAL_ID.to_string(),
                message,
            )),
            Err(err) => Err(self.directory_failure(object, RemoteOperation::Create, err)),
        }
    }

    /// Record a link for a remote object that now exists.
    async fn commit_link(
        &self,
        key: LinkKey,
        external_id: String,
        operation: RemoteOperation,
    ) -> SyncResult<()> {
        let links = self.links.clone();
        let record = LinkRecord::new(key.clone(), external_id.clone());
        let outcome = tokio::spawn(async move { links.insert(record).await }).await;

        let cause = match outcome {
            Ok(Ok(_)) => return Ok(()),
            // Same link already recorded: link and directory agree.
            Ok(Err(LinkStoreError::AlreadyLinked {
                external_id: Some(existing),
                ..
            })) if existing == external_id => {
                debug!("Link {} -> '{}' already recorded", key, existing);
                return Ok(());
            }
            Ok(Err(err)) => err.to_string(),
            Err(join) => format!("link write task failed: {}", join),
        };
        Err(self.integrity_failure(key, operation, external_id, cause))
    }

    /// Forget the link of a remote object that no longer exists or is suspended.
    async fn commit_unlink(
        &self,
        key: LinkKey,
        external_id: String,
        operation: RemoteOperation,
    ) -> SyncResult<()> {
        let links = self.links.clone();
        let task_key = key.clone();
        let outcome = tokio::spawn(async move { links.delete(&task_key).await }).await;

        let cause = match outcome {
            Ok(Ok(_)) => return Ok(()),
            Ok(Err(err)) => err.to_string(),
            Err(join) => format!("link delete task failed: {}", join),
        };
        Err(self.integrity_failure(key, operation, external_id, cause))
    }

    fn integrity_failure(
        &self,
        key: LinkKey,
        operation: RemoteOperation,
        external_id: String,
        cause: String,
    ) -> SyncError {
        let err = IntegrityError {
            key,
            operation,
            external_id,
            cause,
        };
        error!("{}", err);
        self.events.record(
            SyncEvent::new(EventAction::IntegrityError, &self.provider.id, err.to_string())
                .with_object(err.key.object_ref())
                .with_context(json!({
                    "operation": operation.to_string(),
                    "external_id": err.external_id,
                    "kind": err.key.kind().as_str(),
                })),
        );
        err.into()
    }

    fn directory_failure<O>(&self, object: &O, operation: RemoteOperation, err: DirectoryError) -> SyncError
    where
        O: SyncObject + ?Sized,
    {
        match err {
            DirectoryError::Transient {
                message,
                retry_after,
            } => {
                if self.transient_log.should_report(&self.provider.id) {
                    warn!(
                        "Directory for provider {} temporarily unavailable during {} of {} '{}': {}",
                        self.provider.id,
                        operation,
                        object.kind(),
                        object.object_ref(),
                        message
                    );
                } else {
                    debug!(
                        "Transient failure during {} of {} '{}': {}",
                        operation,
                        object.kind(),
                        object.object_ref(),
                        message
                    );
                }
                SyncError::Transient {
                    message,
                    retry_after,
                }
            }
            other => {
                let reason = match other {
                    DirectoryError::ObjectExists { .. } => StopReason::Conflict,
                    _ => StopReason::Rejected,
                };
                self.stop(
                    StopSync::new(reason, object.kind(), object.object_ref(), other.to_string()),
                    json!({ "operation": operation.to_string() }),
                )
            }
        }
    }

    fn stop(&self, stop: StopSync, context: Value) -> SyncError {
        warn!("{}", stop);
        self.events.record(
            SyncEvent::new(EventAction::SyncStopped, &self.provider.id, stop.to_string())
                .with_object(&stop.object_ref)
                .with_context(context),
        );
        stop.into()
    }
}
