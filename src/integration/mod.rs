//! Integration context - binds configured services into a run
//!
//! A pipeline declares the integrations it depends on. Before the run,
//! each dependency is resolved to a concrete configuration: its sanitized
//! fields become a context binding, and its secrets stay here, reachable
//! only through [`IntegrationContext::secret`].

use crate::core::brick_config::OutputKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Key of the marker object added to every integration binding
pub const INTEGRATION_MARKER_KEY: &str = "__integration";

/// Errors raised while resolving integrations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    #[error("integration '{integration_id}' is not configured")]
    NotConfigured { integration_id: String },

    #[error("configuration '{config_id}' not found for integration '{integration_id}'")]
    ConfigNotFound { integration_id: String, config_id: String },

    #[error("integration '{integration_id}' has {count} configurations; pick one with configId")]
    Ambiguous { integration_id: String, count: usize },

    #[error("integration output key '{0}' is declared more than once")]
    DuplicateOutputKey(String),

    #[error("invalid integration output key '{0}'")]
    InvalidOutputKey(String),
}

/// A secret value. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

/// An integration a pipeline depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationDependency {
    pub integration_id: String,
    pub output_key: OutputKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,
    /// Bind `null` instead of failing when nothing is configured
    #[serde(default)]
    pub optional: bool,
}

impl IntegrationDependency {
    pub fn new(integration_id: impl Into<String>, output_key: impl Into<OutputKey>) -> Self {
        Self {
            integration_id: integration_id.into(),
            output_key: output_key.into(),
            config_id: None,
            optional: false,
        }
    }
}

/// A configured instance of an integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfig {
    pub integration_id: String,
    pub config_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Fields safe to expose to templates
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub secrets: BTreeMap<String, SecretValue>,
}

/// A dependency resolved to its configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIntegration {
    pub integration_id: String,
    pub config_id: String,
    sanitized: Map<String, Value>,
    secrets: BTreeMap<String, SecretValue>,
}

impl ResolvedIntegration {
    fn from_config(config: &IntegrationConfig) -> Self {
        Self {
            integration_id: config.integration_id.clone(),
            config_id: config.config_id.clone(),
            sanitized: config.config.clone(),
            secrets: config.secrets.clone(),
        }
    }

    /// Context value: sanitized fields plus the `__integration` marker
    pub fn to_context_value(&self) -> Value {
        let mut value = self.sanitized.clone();
        value.insert(
            INTEGRATION_MARKER_KEY.to_string(),
            json!({"id": self.integration_id, "configId": self.config_id}),
        );
        Value::Object(value)
    }
}

/// Integrations resolved for one run, keyed by output key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrationContext {
    bindings: BTreeMap<OutputKey, Option<ResolvedIntegration>>,
}

impl IntegrationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, output_key: OutputKey, integration: Option<ResolvedIntegration>) {
        self.bindings.insert(output_key, integration);
    }

    pub fn get(&self, output_key: &str) -> Option<&ResolvedIntegration> {
        self.bindings
            .iter()
            .find(|(key, _)| key.as_str() == output_key)
            .and_then(|(_, integration)| integration.as_ref())
    }

    /// `(@key, value)` pairs to add to the initial context
    pub fn context_bindings(&self) -> Vec<(String, Value)> {
        self.bindings
            .iter()
            .map(|(key, integration)| {
                let value = integration
                    .as_ref()
                    .map(ResolvedIntegration::to_context_value)
                    .unwrap_or(Value::Null);
                (key.binding(), value)
            })
            .collect()
    }

    /// Look up a secret of the integration bound under `output_key`
    pub fn secret(&self, output_key: &str, name: &str) -> Option<&SecretValue> {
        self.get(output_key)?.secrets.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Resolves a pipeline's integration dependencies
#[async_trait]
pub trait IntegrationContextBuilder: Send + Sync {
    async fn build(&self, dependencies: &[IntegrationDependency]) -> Result<IntegrationContext, IntegrationError>;
}

/// Resolves dependencies against a fixed list of configurations
#[derive(Debug, Clone, Default)]
pub struct StaticIntegrationResolver {
    configs: Vec<IntegrationConfig>,
}

impl StaticIntegrationResolver {
    pub fn new(configs: Vec<IntegrationConfig>) -> Self {
        Self { configs }
    }

    fn resolve(&self, dependency: &IntegrationDependency) -> Result<Option<ResolvedIntegration>, IntegrationError> {
        let candidates: Vec<&IntegrationConfig> = self
            .configs
            .iter()
            .filter(|config| config.integration_id == dependency.integration_id)
            .collect();

        if let Some(config_id) = &dependency.config_id {
            return candidates
                .into_iter()
                .find(|config| &config.config_id == config_id)
                .map(|config| Some(ResolvedIntegration::from_config(config)))
                .ok_or_else(|| IntegrationError::ConfigNotFound {
                    integration_id: dependency.integration_id.clone(),
                    config_id: config_id.clone(),
                });
        }

        match candidates.as_slice() {
            [] if dependency.optional => Ok(None),
            [] => Err(IntegrationError::NotConfigured {
                integration_id: dependency.integration_id.clone(),
            }),
            [config] => Ok(Some(ResolvedIntegration::from_config(config))),
            many => Err(IntegrationError::Ambiguous {
                integration_id: dependency.integration_id.clone(),
                count: many.len(),
            }),
        }
    }
}

#[async_trait]
impl IntegrationContextBuilder for StaticIntegrationResolver {
    async fn build(&self, dependencies: &[IntegrationDependency]) -> Result<IntegrationContext, IntegrationError> {
        let mut seen = HashSet::new();
        let mut context = IntegrationContext::new();

        for dependency in dependencies {
            if !dependency.output_key.is_valid() {
                return Err(IntegrationError::InvalidOutputKey(dependency.output_key.to_string()));
            }
            if !seen.insert(dependency.output_key.clone()) {
                return Err(IntegrationError::DuplicateOutputKey(dependency.output_key.to_string()));
            }

            let resolved = self.resolve(dependency)?;
            debug!(
                integration_id = %dependency.integration_id,
                output_key = %dependency.output_key,
                configured = resolved.is_some(),
                "Resolved integration"
            );
            context.insert(dependency.output_key.clone(), resolved);
        }

        Ok(context)
    }
}
