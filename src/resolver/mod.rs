//! Expression resolution - turns tagged config values into concrete JSON
//!
//! The resolver is pure: it reads the execution context and never runs
//! anything. Pipeline expressions pass through unresolved so the brick
//! that receives them can hand them back to the reducer.

pub mod path;
pub mod template;

pub use path::{Segment, VarPath};
pub use template::{single_substitution, BuiltinTemplateEngine, TemplateEngine, TemplateKind};

use crate::core::context::ExecutionContext;
use crate::core::expression::{ConfigValue, Expression};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while resolving an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("malformed variable path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("invalid {kind} template: {reason}")]
    Syntax { kind: TemplateKind, reason: String },

    #[error("undefined variable: {0}")]
    Undefined(String),

    #[error("{kind} template failed to render: {reason}")]
    Failed { kind: TemplateKind, reason: String },

    #[error("value could not be encoded: {0}")]
    Encoding(String),
}

/// Runtime API version of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    V1,
    V2,
    #[default]
    V3,
}

impl ApiVersion {
    /// Before v3, literal strings containing `{{` were rendered as mustache
    pub fn implicit_templates(&self) -> bool {
        matches!(self, ApiVersion::V1 | ApiVersion::V2)
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiVersion::V1 => f.write_str("v1"),
            ApiVersion::V2 => f.write_str("v2"),
            ApiVersion::V3 => f.write_str("v3"),
        }
    }
}

/// Resolves expressions against an execution context
#[derive(Clone)]
pub struct ExpressionResolver {
    engine: Arc<dyn TemplateEngine>,
}

impl Default for ExpressionResolver {
    fn default() -> Self {
        Self::new(Arc::new(BuiltinTemplateEngine::new()))
    }
}

impl ExpressionResolver {
    pub fn new(engine: Arc<dyn TemplateEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &dyn TemplateEngine {
        self.engine.as_ref()
    }

    /// Resolve a single expression
    pub fn resolve(&self, expression: &Expression, ctx: &ExecutionContext) -> Result<Value, RenderError> {
        match expression {
            Expression::Var(path) => Ok(VarPath::parse(path)?.lookup(ctx).unwrap_or(Value::Null)),
            Expression::Nunjucks(template) => self.render(TemplateKind::Nunjucks, template, ctx),
            Expression::Mustache(template) => self.render(TemplateKind::Mustache, template, ctx),
            Expression::Pipeline(_) => {
                serde_json::to_value(expression).map_err(|e| RenderError::Encoding(e.to_string()))
            }
        }
    }

    /// Render a template. A template that is one unfiltered substitution
    /// yields the substituted value itself rather than its text.
    fn render(&self, kind: TemplateKind, template: &str, ctx: &ExecutionContext) -> Result<Value, RenderError> {
        let Some(path) = single_substitution(kind, template) else {
            return self.engine.render(kind, template, ctx);
        };
        if let Some(value) = path.lookup(ctx) {
            return Ok(value);
        }
        // Undefined: the engine still gets to reject it
        self.engine.render(kind, template, ctx)?;
        Ok(Value::Null)
    }

    /// Resolve a config value, walking into objects and arrays
    pub fn resolve_value(
        &self,
        value: &ConfigValue,
        ctx: &ExecutionContext,
        api_version: ApiVersion,
    ) -> Result<Value, RenderError> {
        match value {
            ConfigValue::Expression(expression) => self.resolve(expression, ctx),
            ConfigValue::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(item, ctx, api_version))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            ConfigValue::Object(map) => self.resolve_map(map, ctx, api_version).map(Value::Object),
            ConfigValue::Literal(Value::String(s)) if api_version.implicit_templates() && s.contains("{{") => {
                self.render(TemplateKind::Mustache, s, ctx)
            }
            ConfigValue::Literal(value) => Ok(value.clone()),
        }
    }

    /// Resolve every property of a brick config
    pub fn resolve_config(
        &self,
        config: &BTreeMap<String, ConfigValue>,
        ctx: &ExecutionContext,
        api_version: ApiVersion,
    ) -> Result<Map<String, Value>, RenderError> {
        self.resolve_map(config, ctx, api_version)
    }

    fn resolve_map(
        &self,
        map: &BTreeMap<String, ConfigValue>,
        ctx: &ExecutionContext,
        api_version: ApiVersion,
    ) -> Result<Map<String, Value>, RenderError> {
        map.iter()
            .map(|(key, value)| Ok((key.clone(), self.resolve_value(value, ctx, api_version)?)))
            .collect()
    }

    /// Check the syntax of an expression without a context
    pub fn validate(&self, expression: &Expression) -> Result<(), RenderError> {
        match expression {
            Expression::Var(path) => VarPath::parse(path).map(|_| ()),
            Expression::Nunjucks(template) => self.engine.validate(TemplateKind::Nunjucks, template),
            Expression::Mustache(template) => self.engine.validate(TemplateKind::Mustache, template),
            Expression::Pipeline(_) => Ok(()),
        }
    }
}
