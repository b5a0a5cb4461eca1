//! Link table error types.
//!
//! These errors describe failures of the local link table only. They carry no
//! knowledge of the directory or of sync semantics; the sync client decides
//! whether a failure happened before or after a remote mutation.

use crate::storage::LinkKey;
use std::fmt;

/// Errors that can occur during link table operations.
#[derive(Debug)]
pub enum LinkStoreError {
    /// A link already exists for the key (uniqueness constraint).
    AlreadyLinked {
        key: LinkKey,
        /// External id of the existing link, when the backend could read it.
        external_id: Option<String>,
    },

    /// The backend is temporarily unavailable (locked database, pool exhausted, I/O).
    Unavailable {
        message: String,
        retry_after: Option<std::time::Duration>,
    },

    /// A stored row could not be decoded.
    Serialization {
        message: String,
        field: Option<String>,
    },

    /// Backend could not be opened or initialized.
    Configuration { message: String },

    /// Generic internal error.
    Internal {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl fmt::Display for LinkStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStoreError::AlreadyLinked { key, external_id } => {
                if let Some(external_id) = external_id {
                    write!(f, "Link already exists: {} -> {}", key, external_id)
                } else {
                    write!(f, "Link already exists: {}", key)
                }
            }
            LinkStoreError::Unavailable {
                message,
                retry_after,
            } => {
                if let Some(duration) = retry_after {
                    write!(
                        f,
                        "Link table unavailable: {} (retry after {:?})",
                        message, duration
                    )
                } else {
                    write!(f, "Link table unavailable: {}", message)
                }
            }
            LinkStoreError::Serialization { message, field } => {
                if let Some(field) = field {
                    write!(f, "Serialization error: {} (field: {})", message, field)
                } else {
                    write!(f, "Serialization error: {}", message)
                }
            }
            LinkStoreError::Configuration { message } => {
                write!(f, "Configuration error: {}", message)
            }
            LinkStoreError::Internal { message, .. } => {
                write!(f, "Internal link table error: {}", message)
            }
        }
    }
}

impl std::error::Error for LinkStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinkStoreError::Internal { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl LinkStoreError {
    /// Create a new AlreadyLinked error.
    pub fn already_linked(key: LinkKey, external_id: Option<String>) -> Self {
        Self::AlreadyLinked { key, external_id }
    }

    /// Create a new Unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a new Serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new Serialization error naming the offending field.
    pub fn serialization_in(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new Configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new Internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Check if this error is a uniqueness violation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LinkStoreError::AlreadyLinked { .. })
    }

    /// Check if this error indicates a temporary failure that might succeed on retry.
    pub fn is_temporary(&self) -> bool {
        matches!(self, LinkStoreError::Unavailable { .. })
    }
}
