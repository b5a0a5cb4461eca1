//! Sync engine configuration.
//!
//! [`SyncConfig`] is immutable once handed to a [`SyncClient`](crate::SyncClient):
//! the client holds it behind an `Arc` and never consults global state. Every
//! field has an explicit default so a partial JSON document is a valid config.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_PRIMARY_IDENTIFIER_FIELD: &str = "primaryEmail";
const DEFAULT_ADDRESS_LIST_FIELD: &str = "emails";
const DEFAULT_ADDRESS_FIELD: &str = "address";
const DEFAULT_SUSPENDED_FIELD: &str = "suspended";
const DEFAULT_TRANSIENT_LOG_INTERVAL_SECS: u64 = 300;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for '{field}': {message}")]
    Invalid { field: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// What `delete` does to the remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteAction {
    /// Remove the remote object.
    #[default]
    Delete,
    /// Mark the remote object suspended and forget the link.
    Suspend,
}

/// Resource bounds applied to every property-mapping evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorLimits {
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
    /// Wall-clock budget for one evaluation.
    pub timeout_ms: u64,
}

impl Default for EvaluatorLimits {
    fn default() -> Self {
        Self {
            max_operations: 100_000,
            max_call_levels: 32,
            max_expr_depth: 64,
            max_string_size: 65_536,
            max_array_size: 10_000,
            max_map_size: 10_000,
            timeout_ms: 1_000,
        }
    }
}

impl EvaluatorLimits {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Configuration shared by the schema builder and the sync client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Field that identifies the object remotely; defaulted from the canonical address.
    pub primary_identifier_field: String,
    /// Field holding a list of address entries that must all be valid.
    pub address_list_field: String,
    /// Sub-field of each address entry holding the address itself.
    pub address_field: String,
    pub delete_action: DeleteAction,
    /// Field set to `true` when `delete_action` is [`DeleteAction::Suspend`].
    pub suspended_field: String,
    /// Minimum time between two warnings about transient failures for one provider.
    pub transient_log_interval_secs: u64,
    pub evaluator: EvaluatorLimits,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            primary_identifier_field: DEFAULT_PRIMARY_IDENTIFIER_FIELD.to_string(),
            address_list_field: DEFAULT_ADDRESS_LIST_FIELD.to_string(),
            address_field: DEFAULT_ADDRESS_FIELD.to_string(),
            delete_action: DeleteAction::default(),
            suspended_field: DEFAULT_SUSPENDED_FIELD.to_string(),
            transient_log_interval_secs: DEFAULT_TRANSIENT_LOG_INTERVAL_SECS,
            evaluator: EvaluatorLimits::default(),
        }
    }
}

impl SyncConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("primary_identifier_field", &self.primary_identifier_field),
            ("address_list_field", &self.address_list_field),
            ("address_field", &self.address_field),
            ("suspended_field", &self.suspended_field),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(field, "must not be empty"));
            }
        }
        if self.evaluator.max_operations == 0 {
            return Err(ConfigError::invalid(
                "evaluator.max_operations",
                "must be greater than zero",
            ));
        }
        if self.evaluator.timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "evaluator.timeout_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn transient_log_interval(&self) -> Duration {
        Duration::from_secs(self.transient_log_interval_secs)
    }

    pub fn with_primary_identifier_field(mut self, field: impl Into<String>) -> Self {
        self.primary_identifier_field = field.into();
        self
    }

    pub fn with_address_fields(
        mut self,
        list_field: impl Into<String>,
        address_field: impl Into<String>,
    ) -> Self {
        self.address_list_field = list_field.into();
        self.address_field = address_field.into();
        self
    }

    pub fn with_delete_action(mut self, action: DeleteAction) -> Self {
        self.delete_action = action;
        self
    }

    pub fn with_transient_log_interval(mut self, interval: Duration) -> Self {
        self.transient_log_interval_secs = interval.as_secs();
        self
    }

    pub fn with_evaluator_limits(mut self, limits: EvaluatorLimits) -> Self {
        self.evaluator = limits;
        self
    }
}
