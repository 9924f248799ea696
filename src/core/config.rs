//! Definition files (one pipeline and its integrations) and the runtime
//! config a host supplies alongside them

use crate::core::brick_config::{BrickConfig, OutputKey};
use crate::core::expression::Expression;
use crate::integration::{IntegrationConfig, IntegrationDependency};
use crate::resolver::{ApiVersion, ExpressionResolver};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

/// A pipeline file: the pipeline plus what it needs to run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline name
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Runtime API version; falls back to the runtime config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<ApiVersion>,

    /// Input used when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Value>,

    /// Integrations the pipeline depends on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub integrations: Vec<IntegrationDependency>,

    /// The steps
    pub pipeline: Vec<BrickConfig>,
}

impl PipelineDefinition {
    /// Read a definition file. JSON parses too, being a subset of YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse a definition and check it with the default template engine
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let definition: PipelineDefinition =
            serde_yaml::from_str(yaml).context("Malformed pipeline definition")?;
        definition.validate(&ExpressionResolver::default())?;
        Ok(definition)
    }

    /// Validate the definition against a resolver's template engine
    pub fn validate(&self, resolver: &ExpressionResolver) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        let mut integration_keys = HashSet::new();
        for dependency in &self.integrations {
            if !dependency.output_key.is_valid() {
                anyhow::bail!("Invalid integration output key: '{}'", dependency.output_key);
            }
            if !integration_keys.insert(&dependency.output_key) {
                anyhow::bail!("Duplicate integration output key: '{}'", dependency.output_key);
            }
        }

        for config in &self.pipeline {
            if let Some(key) = &config.output_key {
                if integration_keys.contains(key) {
                    anyhow::bail!(
                        "Output key '{}' of brick '{}' collides with an integration output key",
                        key,
                        config.id
                    );
                }
            }
        }

        validate_pipeline(&self.pipeline, resolver)
    }
}

/// Check a pipeline before running it.
///
/// Recurses into nested pipelines; each nested pipeline is its own scope
/// for output keys.
pub fn validate_pipeline(pipeline: &[BrickConfig], resolver: &ExpressionResolver) -> Result<()> {
    validate_scope(pipeline, resolver, "pipeline")
}

fn validate_scope(pipeline: &[BrickConfig], resolver: &ExpressionResolver, location: &str) -> Result<()> {
    let mut seen_keys: HashSet<&OutputKey> = HashSet::new();

    for (index, config) in pipeline.iter().enumerate() {
        let step = format!("{}[{}]", location, index);

        if config.id.as_str().trim().is_empty() {
            anyhow::bail!("Brick at {} has an empty id", step);
        }

        if let Some(key) = &config.output_key {
            if !key.is_valid() {
                anyhow::bail!("Invalid output key '{}' at {} ({})", key, step, config.id);
            }
            if !seen_keys.insert(key) {
                anyhow::bail!("Duplicate output key '{}' at {} ({})", key, step, config.id);
            }
        }

        let mut expressions: Vec<(&str, &Expression)> = Vec::new();
        for (name, value) in &config.config {
            value.for_each_expression(&mut |expression| expressions.push((name.as_str(), expression)));
        }
        if let Some(condition) = &config.condition {
            condition.for_each_expression(&mut |expression| expressions.push(("condition", expression)));
        }

        for (name, expression) in expressions {
            match expression {
                Expression::Pipeline(nested) => {
                    validate_scope(nested, resolver, &format!("{}.{}", step, name))?;
                }
                other => resolver.validate(other).with_context(|| {
                    format!("Invalid {} expression in '{}' at {} ({})", other.type_name(), name, step, config.id)
                })?,
            }
        }
    }

    Ok(())
}

fn default_validate_input() -> bool {
    true
}

/// Host-side settings for running definitions: defaults, mod identity and
/// the integration configurations definitions may depend on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Default API version for pipelines that don't declare one
    #[serde(default)]
    pub api_version: ApiVersion,

    /// Check brick arguments against their input schemas
    #[serde(default = "default_validate_input")]
    pub validate_input: bool,

    /// Fail on undefined template variables
    #[serde(default)]
    pub strict_templates: bool,

    /// Mod the runs belong to; namespaces mod variables
    #[serde(default)]
    pub mod_id: Option<String>,

    /// Bound as `@options`
    #[serde(default)]
    pub mod_options: Map<String, Value>,

    /// Configured integrations available to pipelines
    #[serde(default)]
    pub integrations: Vec<IntegrationConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_version: ApiVersion::default(),
            validate_input: true,
            strict_templates: false,
            mod_id: None,
            mod_options: Map::new(),
            integrations: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    /// Read a runtime config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read runtime config {}", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml).context("Malformed runtime config")?;
        config.validate()?;
        Ok(config)
    }

    /// Every integration configuration needs an integration id and a
    /// config id, and the pair must be unique
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for integration in &self.integrations {
            if integration.integration_id.trim().is_empty() {
                anyhow::bail!("Integration configuration '{}' has an empty integration id", integration.config_id);
            }
            if integration.config_id.trim().is_empty() {
                anyhow::bail!("Integration '{}' has a configuration with an empty id", integration.integration_id);
            }
            if !seen.insert((&integration.integration_id, &integration.config_id)) {
                anyhow::bail!(
                    "Duplicate configuration '{}' for integration '{}'",
                    integration.config_id,
                    integration.integration_id
                );
            }
        }

        if let Some(mod_id) = &self.mod_id {
            if mod_id.trim().is_empty() {
                anyhow::bail!("mod_id must not be empty when set");
            }
        }

        Ok(())
    }
}
