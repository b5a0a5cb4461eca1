//! Rhai-backed property-mapping evaluator.
//!
//! Mapping expressions are Rhai scripts whose final value is the fragment, e.g.
//!
//! ```text
//! #{ "name": #{ "fullName": object.name }, "primaryEmail": object.email }
//! ```
//!
//! The script sees three constants: `object` (the object's JSON context),
//! `provider` (the provider's JSON context) and `kind` (`"User"` or `"Group"`).
//! A script that evaluates to `()` contributes nothing.

use crate::config::EvaluatorLimits;
use crate::mapping::{MappingError, MappingEvaluator};
use crate::provider::{MappingKind, PropertyMapping, Provider};
use log::debug;
use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use serde_json::Value;
use std::time::Instant;

/// Evaluates mapping expressions in a sandboxed Rhai engine.
///
/// A new engine is created per evaluation so no state leaks between objects or
/// providers. Operation count, call depth, expression depth and collection sizes
/// are bounded by [`EvaluatorLimits`]; a wall-clock deadline is enforced through
/// the engine's progress callback. Module imports resolve to nothing.
#[derive(Debug, Clone, Default)]
pub struct RhaiMappingEvaluator {
    limits: EvaluatorLimits,
}

impl RhaiMappingEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: EvaluatorLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &EvaluatorLimits {
        &self.limits
    }

    /// Check that an expression compiles, without evaluating it.
    pub fn validate_expression(&self, expression: &str) -> Result<(), MappingError> {
        let engine = self.create_engine(Instant::now());
        let scope = Self::placeholder_scope();
        engine
            .compile_with_scope(&scope, expression)
            .map(|_| ())
            .map_err(|e| MappingError::Compile {
                message: e.to_string(),
            })
    }

    fn create_engine(&self, started: Instant) -> Engine {
        let mut engine = Engine::new();

        engine.set_max_operations(self.limits.max_operations);
        engine.set_max_call_levels(self.limits.max_call_levels);
        engine.set_max_expr_depths(self.limits.max_expr_depth, self.limits.max_expr_depth);
        engine.set_max_string_size(self.limits.max_string_size);
        engine.set_max_array_size(self.limits.max_array_size);
        engine.set_max_map_size(self.limits.max_map_size);
        engine.set_strict_variables(true);
        engine.set_module_resolver(DummyModuleResolver::new());
        engine.disable_symbol("eval");

        let budget = self.limits.timeout();
        engine.on_progress(move |_| {
            if started.elapsed() > budget {
                Some(Dynamic::UNIT)
            } else {
                None
            }
        });

        engine.on_print(|text| debug!("Mapping expression output: {}", text));
        engine.on_debug(|text, _, _| debug!("Mapping expression debug: {}", text));

        engine
    }

    fn placeholder_scope() -> Scope<'static> {
        let mut scope = Scope::new();
        scope.push_constant("object", rhai::Map::new());
        scope.push_constant("provider", rhai::Map::new());
        scope.push_constant("kind", String::new());
        scope
    }

    fn build_scope(
        mapping: &PropertyMapping,
        object: &Value,
        provider: &Provider,
    ) -> Result<Scope<'static>, MappingError> {
        let object = rhai::serde::to_dynamic(object).map_err(|e| {
            MappingError::evaluation(format!("object context is not representable: {}", e))
        })?;
        let provider = rhai::serde::to_dynamic(provider.to_context()).map_err(|e| {
            MappingError::evaluation(format!("provider context is not representable: {}", e))
        })?;

        let kind = match &mapping.kind {
            MappingKind::User => "User".to_string(),
            MappingKind::Group => "Group".to_string(),
            MappingKind::Other(other) => other.clone(),
        };

        let mut scope = Scope::new();
        scope.push_constant("object", object);
        scope.push_constant("provider", provider);
        scope.push_constant("kind", kind);
        Ok(scope)
    }

    fn classify(err: Box<EvalAltResult>) -> MappingError {
        match *err {
            EvalAltResult::ErrorTooManyOperations(..)
            | EvalAltResult::ErrorTerminated(..)
            | EvalAltResult::ErrorDataTooLarge(..)
            | EvalAltResult::ErrorStackOverflow(..) => MappingError::LimitExceeded {
                message: err.to_string(),
            },
            _ => MappingError::evaluation(err.to_string()),
        }
    }
}

impl MappingEvaluator for RhaiMappingEvaluator {
    fn evaluate(
        &self,
        mapping: &PropertyMapping,
        object: &Value,
        provider: &Provider,
    ) -> Result<Option<Value>, MappingError> {
        let started = Instant::now();
        let engine = self.create_engine(started);
        let mut scope = Self::build_scope(mapping, object, provider)?;

        let ast = engine
            .compile_with_scope(&scope, &mapping.expression)
            .map_err(|e| MappingError::Compile {
                message: e.to_string(),
            })?;

        let result = engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(Self::classify)?;

        debug!(
            "Evaluated mapping '{}' in {:?}",
            mapping.name,
            started.elapsed()
        );

        if result.is_unit() {
            return Ok(None);
        }

        let value: Value = rhai::serde::from_dynamic(&result).map_err(|e| {
            MappingError::invalid_output(format!("result is not JSON-representable: {}", e))
        })?;

        match value {
            Value::Null => Ok(None),
            other => Ok(Some(other)),
        }
    }
}
