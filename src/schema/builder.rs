//! Builds the external representation of a local object from its provider's mappings.

use crate::config::SyncConfig;
use crate::error::{StopReason, StopSync, SyncResult};
use crate::events::{EventAction, EventSink, SyncEvent};
use crate::mapping::{MappingError, MappingEvaluator};
use crate::object::SyncObject;
use crate::provider::{PropertyMapping, Provider};
use crate::schema::ExternalDocument;
use crate::schema::merge::{deep_merge, strip_nulls};
use log::{debug, trace, warn};
use serde_json::{Value, json};
use std::sync::Arc;

/// Turns a local object into an [`ExternalDocument`].
///
/// Mappings are applied in name order and deep-merged, later mappings winning on
/// conflicting keys. A failing mapping aborts the whole build with `StopSync`
/// after recording a configuration-error event that names the mapping.
#[derive(Clone)]
pub struct SchemaBuilder {
    evaluator: Arc<dyn MappingEvaluator>,
    events: Arc<dyn EventSink>,
    config: Arc<SyncConfig>,
}

impl SchemaBuilder {
    pub fn new(
        evaluator: Arc<dyn MappingEvaluator>,
        events: Arc<dyn EventSink>,
        config: Arc<SyncConfig>,
    ) -> Self {
        Self {
            evaluator,
            events,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Build the document for `object` using the mappings attached to `provider`.
    ///
    /// # Errors
    ///
    /// `StopSync` with [`StopReason::MappingFailed`] when a mapping raises, and
    /// [`StopReason::NoOutput`] when no mapping contributes anything.
    pub fn build<O>(&self, object: &O, provider: &Provider) -> SyncResult<ExternalDocument>
    where
        O: SyncObject + ?Sized,
    {
        let context = object.to_context();
        let mut document = ExternalDocument::new();

        for mapping in provider.mappings_for(object.kind()) {
            let fragment = self
                .evaluate(mapping, &context, provider)
                .map_err(|err| self.mapping_failed(object, provider, mapping, err))?;

            match fragment {
                Some(fragment) if !fragment.is_empty() => {
                    trace!(
                        "Mapping '{}' contributed {} field(s) for {} '{}'",
                        mapping.name,
                        fragment.len(),
                        object.kind(),
                        object.object_ref()
                    );
                    deep_merge(&mut document, fragment);
                }
                _ => debug!(
                    "Mapping '{}' produced nothing for {} '{}'",
                    mapping.name,
                    object.kind(),
                    object.object_ref()
                ),
            }
        }

        if document.is_empty() {
            let stop = StopSync::new(
                StopReason::NoOutput,
                object.kind(),
                object.object_ref(),
                format!("no {} mappings configured or none produced output", object.kind()),
            );
            warn!("{}", stop);
            self.events.record(
                SyncEvent::new(EventAction::ConfigurationError, &provider.id, stop.to_string())
                    .with_object(object.object_ref()),
            );
            return Err(stop.into());
        }

        let mut document = strip_nulls(document);
        let primary = &self.config.primary_identifier_field;
        if !document.contains_key(primary) {
            document.insert(
                primary.clone(),
                Value::String(object.canonical_address().to_string()),
            );
        }

        Ok(document)
    }

    fn evaluate(
        &self,
        mapping: &PropertyMapping,
        context: &Value,
        provider: &Provider,
    ) -> Result<Option<ExternalDocument>, MappingError> {
        match self.evaluator.evaluate(mapping, context, provider)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(fragment)) => Ok(Some(fragment)),
            Some(other) => Err(MappingError::invalid_output(format!(
                "expected an object, got {}",
                json_type(&other)
            ))),
        }
    }

    fn mapping_failed<O>(
        &self,
        object: &O,
        provider: &Provider,
        mapping: &PropertyMapping,
        err: MappingError,
    ) -> crate::error::SyncError
    where
        O: SyncObject + ?Sized,
    {
        let stop = StopSync::new(
            StopReason::MappingFailed,
            object.kind(),
            object.object_ref(),
            err.to_string(),
        )
        .with_mapping(&mapping.name);
        warn!("{}", stop);
        self.events.record(
            SyncEvent::new(
                EventAction::ConfigurationError,
                &provider.id,
                format!("Failed to evaluate property mapping: {}", err),
            )
            .with_object(object.object_ref())
            .with_mapping(&mapping.name)
            .with_context(json!({ "kind": object.kind().as_str() })),
        );
        stop.into()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
