//! Transport boundary to the external directory.
//!
//! A [`DirectoryClient`] performs the three remote mutations the sync client
//! needs and reports failures through [`DirectoryError`], already classified.
//! Transport details such as status codes stop here.

pub mod http;

pub use http::{HttpDirectoryClient, HttpDirectoryConfig};

use crate::schema::ExternalDocument;
use std::future::Future;
use std::time::Duration;

/// Classified failure of a remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// Rate limited, server error, timeout or connection failure.
    #[error("Directory temporarily unavailable: {message}")]
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },

    /// The directory already holds an object with the same identifier.
    #[error("Object already exists in directory: {message}")]
    ObjectExists { message: String },

    /// The addressed object does not exist in the directory.
    #[error("Object not found in directory: {message}")]
    NotFound { message: String },

    /// The directory accepted a create but its identifier could not be
    /// determined. The remote object exists and cannot be linked.
    #[error("Object created in directory without a usable identifier: {message}")]
    CreatedWithoutId { message: String },

    /// Any other refusal: bad request, authorization, unparseable response.
    #[error("Directory rejected request{}: {message}", status_suffix(.status))]
    Rejected {
        status: Option<u16>,
        message: String,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl DirectoryError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn object_exists(message: impl Into<String>) -> Self {
        Self::ObjectExists {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, DirectoryError::Transient { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::NotFound { .. })
    }

    pub fn is_object_exists(&self) -> bool {
        matches!(self, DirectoryError::ObjectExists { .. })
    }
}

/// Remote operations against one collection of the directory.
pub trait DirectoryClient: Send + Sync {
    /// Create an object and return the identifier the directory assigned.
    fn create(
        &self,
        document: &ExternalDocument,
    ) -> impl Future<Output = Result<String, DirectoryError>> + Send;

    /// Replace the object identified by `external_id`.
    fn update(
        &self,
        external_id: &str,
        document: &ExternalDocument,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Remove the object identified by `external_id`.
    fn delete(&self, external_id: &str) -> impl Future<Output = Result<(), DirectoryError>> + Send;
}
