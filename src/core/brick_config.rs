//! Brick invocation model - one step of a pipeline

use crate::core::expression::{ConfigValue, Expression};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

/// Registry identifier of a brick, e.g. `@brick/for-each`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrickId(String);

impl BrickId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BrickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BrickId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BrickId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Name under which a step's output becomes addressable (`@<key>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputKey(String);

impl OutputKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The context variable the output is bound to
    pub fn binding(&self) -> String {
        format!("@{}", self.0)
    }

    /// Output keys are plain identifiers
    pub fn is_valid(&self) -> bool {
        is_identifier(&self.0)
    }
}

/// `^[A-Za-z_][A-Za-z0-9_]*$`
pub fn is_identifier(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"))
        .is_match(name)
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OutputKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// A single brick invocation within a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrickConfig {
    /// Which brick to run
    pub id: BrickId,

    /// Brick arguments; values may be literals or expressions
    #[serde(default)]
    pub config: BTreeMap<String, ConfigValue>,

    /// Bind the output under `@<outputKey>` for later steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<OutputKey>,

    /// Run the step only when this resolves truthy
    #[serde(default, alias = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConfigValue>,

    /// Display label (editor only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Assigned by normalization; used for tracing only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<Uuid>,
}

impl BrickConfig {
    pub fn new(id: impl Into<BrickId>) -> Self {
        Self {
            id: id.into(),
            config: BTreeMap::new(),
            output_key: None,
            condition: None,
            label: None,
            instance_id: None,
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_output_key(mut self, key: impl Into<OutputKey>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<ConfigValue>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sub-pipelines passed to this brick as `pipeline` expressions
    pub fn nested_pipelines(&self) -> Vec<&[BrickConfig]> {
        let mut nested = Vec::new();
        for value in self.config.values().chain(self.condition.iter()) {
            value.for_each_expression(&mut |expression| {
                if let Expression::Pipeline(pipeline) = expression {
                    nested.push(pipeline.as_slice());
                }
            });
        }
        nested
    }

    fn for_each_nested_mut(&mut self, f: &mut dyn FnMut(&mut Vec<BrickConfig>)) {
        for value in self.config.values_mut() {
            value.for_each_pipeline_mut(f);
        }
        if let Some(condition) = self.condition.as_mut() {
            condition.for_each_pipeline_mut(f);
        }
    }
}

fn walk_pipeline(pipeline: &mut [BrickConfig], f: &mut dyn FnMut(&mut BrickConfig)) {
    for config in pipeline.iter_mut() {
        f(config);
        config.for_each_nested_mut(&mut |nested| walk_pipeline(nested, &mut *f));
    }
}

/// Visit every brick in a pipeline, nested pipelines included
pub fn for_each_brick(pipeline: &[BrickConfig], f: &mut dyn FnMut(&BrickConfig)) {
    for config in pipeline {
        f(config);
        for nested in config.nested_pipelines() {
            for_each_brick(nested, f);
        }
    }
}

/// Assign an `instanceId` to every brick (including nested pipelines) that lacks one.
///
/// Returns a new pipeline; the input is left untouched.
pub fn normalize_pipeline(pipeline: &[BrickConfig]) -> Vec<BrickConfig> {
    let mut normalized = pipeline.to_vec();
    walk_pipeline(&mut normalized, &mut |config| {
        if config.instance_id.is_none() {
            config.instance_id = Some(Uuid::new_v4());
        }
    });
    normalized
}

/// Strip editor-only metadata (`instanceId`) from every brick, recursively.
pub fn omit_editor_metadata(pipeline: &[BrickConfig]) -> Vec<BrickConfig> {
    let mut stripped = pipeline.to_vec();
    walk_pipeline(&mut stripped, &mut |config| config.instance_id = None);
    stripped
}
