//! Expression model - tagged template/variable/pipeline values inside brick configs

use crate::core::brick_config::BrickConfig;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key carrying the expression type in the serialized form
pub const TYPE_KEY: &str = "__type__";

/// Key carrying the expression payload in the serialized form
pub const VALUE_KEY: &str = "__value__";

/// A tagged expression: `{ "__type__": "var", "__value__": "@input.url" }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__type__", content = "__value__", rename_all = "lowercase")]
pub enum Expression {
    /// Variable path lookup (`@output.items[0].name`)
    Var(String),
    /// Nunjucks-style template string
    Nunjucks(String),
    /// Mustache-style template string
    Mustache(String),
    /// Nested sub-pipeline, executed by the brick that receives it
    Pipeline(Vec<BrickConfig>),
}

impl Expression {
    pub fn var(path: impl Into<String>) -> Self {
        Expression::Var(path.into())
    }

    pub fn nunjucks(template: impl Into<String>) -> Self {
        Expression::Nunjucks(template.into())
    }

    pub fn mustache(template: impl Into<String>) -> Self {
        Expression::Mustache(template.into())
    }

    /// Name of the expression type as it appears in `__type__`
    pub fn type_name(&self) -> &'static str {
        match self {
            Expression::Var(_) => "var",
            Expression::Nunjucks(_) => "nunjucks",
            Expression::Mustache(_) => "mustache",
            Expression::Pipeline(_) => "pipeline",
        }
    }
}

/// A value in a brick's configuration.
///
/// Objects and arrays are walked so expressions may appear at any depth;
/// any other JSON value is a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Expression(Expression),
    Array(Vec<ConfigValue>),
    Object(BTreeMap<String, ConfigValue>),
    Literal(Value),
}

impl ConfigValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        ConfigValue::Literal(value.into())
    }

    pub fn var(path: impl Into<String>) -> Self {
        ConfigValue::Expression(Expression::var(path))
    }

    pub fn nunjucks(template: impl Into<String>) -> Self {
        ConfigValue::Expression(Expression::nunjucks(template))
    }

    pub fn mustache(template: impl Into<String>) -> Self {
        ConfigValue::Expression(Expression::mustache(template))
    }

    pub fn pipeline(pipeline: Vec<BrickConfig>) -> Self {
        ConfigValue::Expression(Expression::Pipeline(pipeline))
    }

    /// Visit every expression in this value, depth first
    pub fn for_each_expression<'a>(&'a self, f: &mut dyn FnMut(&'a Expression)) {
        match self {
            ConfigValue::Expression(expression) => f(expression),
            ConfigValue::Array(items) => items.iter().for_each(|item| item.for_each_expression(f)),
            ConfigValue::Object(map) => map.values().for_each(|item| item.for_each_expression(f)),
            ConfigValue::Literal(_) => {}
        }
    }

    /// Visit every nested pipeline mutably (used by normalization)
    pub fn for_each_pipeline_mut(&mut self, f: &mut dyn FnMut(&mut Vec<BrickConfig>)) {
        match self {
            ConfigValue::Expression(Expression::Pipeline(pipeline)) => f(pipeline),
            ConfigValue::Expression(_) | ConfigValue::Literal(_) => {}
            ConfigValue::Array(items) => items.iter_mut().for_each(|item| item.for_each_pipeline_mut(f)),
            ConfigValue::Object(map) => map.values_mut().for_each(|item| item.for_each_pipeline_mut(f)),
        }
    }
}

impl From<Expression> for ConfigValue {
    fn from(expression: Expression) -> Self {
        ConfigValue::Expression(expression)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::literal(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::literal(value)
    }
}

impl TryFrom<Value> for ConfigValue {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) if map.contains_key(TYPE_KEY) => {
                serde_json::from_value::<Expression>(Value::Object(map)).map(ConfigValue::Expression)
            }
            Value::Object(map) => map
                .into_iter()
                .map(|(key, item)| Ok((key, ConfigValue::try_from(item)?)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(ConfigValue::Object),
            Value::Array(items) => items
                .into_iter()
                .map(ConfigValue::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(ConfigValue::Array),
            other => Ok(ConfigValue::Literal(other)),
        }
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigValue::Expression(expression) => expression.serialize(serializer),
            ConfigValue::Array(items) => items.serialize(serializer),
            ConfigValue::Object(map) => map.serialize(serializer),
            ConfigValue::Literal(value) => value.serialize(serializer),
        }
    }
}

// Goes through `Value` so that a two-element array is never mistaken for
// the sequence form of an adjacently tagged enum.
impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ConfigValue::try_from(value).map_err(D::Error::custom)
    }
}
