//! Error types for outbound synchronization.
//!
//! Failures are split by what the caller should do about them:
//!
//! - [`SyncError::Transient`] - the directory is temporarily unavailable; retry with backoff
//! - [`SyncError::StopSync`] - permanent failure; surface to an administrator, never retry blindly
//! - [`SyncError::Integrity`] - the link table and the directory diverged after a remote mutation
//! - [`SyncError::Storage`] - the link table failed before any remote mutation happened
//!
//! Conflict (`ObjectExists`) and `NotFound` responses from the directory never reach the
//! caller directly; they are classified at the [`DirectoryClient`](crate::directory::DirectoryClient)
//! boundary and resolved by the sync client.

use crate::object::ObjectKind;
use crate::storage::{LinkKey, LinkStoreError};
use std::fmt;
use std::time::Duration;

/// Result alias used throughout the sync engine.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors returned by [`SyncClient::write`](crate::SyncClient::write) and
/// [`SyncClient::delete`](crate::SyncClient::delete).
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Remote system rate-limited us, returned a 5xx, or could not be reached.
    #[error("Transient directory failure: {message}")]
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Permanent failure for this object.
    #[error(transparent)]
    StopSync(#[from] StopSync),

    /// Local link state no longer matches the directory.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Link table failure before any remote call was made.
    #[error("Link table error: {0}")]
    Storage(#[from] LinkStoreError),
}

impl SyncError {
    /// Whether an outer scheduler may retry the same call.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transient { .. } => true,
            SyncError::Storage(err) => err.is_temporary(),
            SyncError::StopSync(_) | SyncError::Integrity(_) => false,
        }
    }

    /// Delay requested by the directory, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SyncError::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn is_stop_sync(&self) -> bool {
        matches!(self, SyncError::StopSync(_))
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, SyncError::Integrity(_))
    }
}

/// Why a sync was stopped permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A property mapping raised while evaluating.
    MappingFailed,
    /// No mapping produced any output.
    NoOutput,
    /// An address in the built document is malformed or outside the allowed domains.
    InvalidAddress,
    /// The directory refused the request for a non-retryable reason.
    Rejected,
    /// The directory reported a collision that cannot be adopted.
    Conflict,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StopReason::MappingFailed => "mapping failed",
            StopReason::NoOutput => "no mapping output",
            StopReason::InvalidAddress => "invalid address",
            StopReason::Rejected => "rejected by directory",
            StopReason::Conflict => "conflict",
        };
        f.write_str(name)
    }
}

/// Permanent, non-retryable failure for a single object.
///
/// Carries the object and, when one is to blame, the mapping that caused it so an
/// operator can find the offending configuration.
#[derive(Debug, Clone)]
pub struct StopSync {
    pub reason: StopReason,
    pub object_kind: ObjectKind,
    pub object_ref: String,
    pub mapping: Option<String>,
    pub cause: String,
}

impl StopSync {
    pub fn new(
        reason: StopReason,
        object_kind: ObjectKind,
        object_ref: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            reason,
            object_kind,
            object_ref: object_ref.into(),
            mapping: None,
            cause: cause.into(),
        }
    }

    /// Attribute the failure to a property mapping.
    pub fn with_mapping(mut self, mapping: impl Into<String>) -> Self {
        self.mapping = Some(mapping.into());
        self
    }
}

impl fmt::Display for StopSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sync stopped for {} '{}' ({})",
            self.object_kind, self.object_ref, self.reason
        )?;
        if let Some(mapping) = &self.mapping {
            write!(f, " in mapping '{}'", mapping)?;
        }
        write!(f, ": {}", self.cause)
    }
}

impl std::error::Error for StopSync {}

/// Remote mutation whose outcome has to be mirrored in the link table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    Create,
    Adopt,
    Update,
    Delete,
    Suspend,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteOperation::Create => "create",
            RemoteOperation::Adopt => "adopt",
            RemoteOperation::Update => "update",
            RemoteOperation::Delete => "delete",
            RemoteOperation::Suspend => "suspend",
        };
        f.write_str(name)
    }
}

/// The directory was mutated but the matching link table write failed.
///
/// A reconciliation sweep has to repair these; retrying the same call inline may
/// create a duplicate remote object.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Link table diverged from directory for {key} after remote {operation} of '{external_id}': {cause}")]
pub struct IntegrityError {
    pub key: LinkKey,
    pub operation: RemoteOperation,
    pub external_id: String,
    pub cause: String,
}
