//! Property-mapping evaluation.
//!
//! The sync engine does not interpret mapping expressions itself. It hands each
//! [`PropertyMapping`] to a [`MappingEvaluator`] together with the object and
//! provider context, and reacts to the fragment (or failure) it gets back.
//!
//! [`RhaiMappingEvaluator`] is the bundled implementation: every evaluation runs
//! in a fresh, resource-bounded script engine with no access to the file system.
//! Any `Fn(&PropertyMapping, &Value, &Provider) -> Result<Option<Value>, MappingError>`
//! closure is also an evaluator, which keeps tests and embedded callers simple.

pub mod rhai;

pub use self::rhai::RhaiMappingEvaluator;

use crate::provider::{PropertyMapping, Provider};
use serde_json::Value;

/// Failure raised while evaluating a property mapping.
///
/// All variants are data or configuration problems; none of them is retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("Expression failed to compile: {message}")]
    Compile { message: String },

    #[error("Expression failed: {message}")]
    Evaluation { message: String },

    #[error("Expression exceeded its resource limits: {message}")]
    LimitExceeded { message: String },

    #[error("Expression returned an invalid fragment: {message}")]
    InvalidOutput { message: String },
}

impl MappingError {
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput {
            message: message.into(),
        }
    }
}

/// Strategy that turns one mapping into a document fragment.
pub trait MappingEvaluator: Send + Sync {
    /// Evaluate `mapping` for `object` (the object's JSON context).
    ///
    /// `Ok(None)` means the mapping has nothing to contribute for this object.
    fn evaluate(
        &self,
        mapping: &PropertyMapping,
        object: &Value,
        provider: &Provider,
    ) -> Result<Option<Value>, MappingError>;
}

impl<F> MappingEvaluator for F
where
    F: Fn(&PropertyMapping, &Value, &Provider) -> Result<Option<Value>, MappingError>
        + Send
        + Sync,
{
    fn evaluate(
        &self,
        mapping: &PropertyMapping,
        object: &Value,
        provider: &Provider,
    ) -> Result<Option<Value>, MappingError> {
        self(mapping, object, provider)
    }
}
