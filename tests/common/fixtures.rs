//! Providers, objects and evaluators used across test files.

use directory_sync::mapping::{MappingError, MappingEvaluator};
use directory_sync::{LocalGroup, LocalUser, PropertyMapping, Provider};
use serde_json::Value;
use std::sync::Arc;

pub const PROVIDER_ID: &str = "google-workspace";

/// Evaluator that parses each mapping expression as a JSON literal.
///
/// The expression `raise` fails, mimicking a mapping that throws.
pub fn literal_evaluator() -> Arc<dyn MappingEvaluator> {
    Arc::new(
        |mapping: &PropertyMapping, _: &Value, _: &Provider| -> Result<Option<Value>, MappingError> {
            if mapping.expression == "raise" {
                return Err(MappingError::evaluation(format!(
                    "mapping '{}' raised",
                    mapping.name
                )));
            }
            serde_json::from_str(&mapping.expression)
                .map(Some)
                .map_err(|e| MappingError::evaluation(e.to_string()))
        },
    )
}

/// Provider with one user mapping and one group mapping.
pub fn standard_provider() -> Provider {
    Provider::new(PROVIDER_ID, "Google Workspace")
        .with_mapping(PropertyMapping::user(
            "10-name",
            r#"{"name": {"givenName": "Jane", "familyName": "Doe"}}"#,
        ))
        .with_mapping(PropertyMapping::group("10-group", r#"{"name": "Engineering"}"#))
}

pub fn provider_without_mappings() -> Provider {
    Provider::new(PROVIDER_ID, "Google Workspace")
}

pub fn jane() -> LocalUser {
    LocalUser::new("user-1", "jane", "jane@example.com").with_name("Jane Doe")
}

pub fn engineering() -> LocalGroup {
    LocalGroup::new("group-1", "engineering", "engineering@example.com")
}
