//! Execution context - the variables visible to a step

use serde_json::{Map, Value};
use std::sync::Arc;

/// Binding for the pipeline input
pub const INPUT_KEY: &str = "@input";

/// Binding for mod-level options
pub const OPTIONS_KEY: &str = "@options";

/// Binding for the mod-variable snapshot
pub const MOD_KEY: &str = "@mod";

/// Variables visible to a step.
///
/// Immutable: adding a binding produces a new context, so a step can
/// never observe bindings made after it started.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    bindings: Arc<Map<String, Value>>,
}

impl ExecutionContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a binding
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.bindings.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.bindings.contains_key(key)
    }

    /// Return a copy of this context with one extra binding
    pub fn with_binding(&self, key: impl Into<String>, value: Value) -> Self {
        let mut bindings = Arc::clone(&self.bindings);
        Arc::make_mut(&mut bindings).insert(key.into(), value);
        Self { bindings }
    }

    /// Return a copy of this context with several extra bindings
    pub fn with_bindings<I, K>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut bindings = Arc::clone(&self.bindings);
        let map = Arc::make_mut(&mut bindings);
        for (key, value) in extra {
            map.insert(key.into(), value);
        }
        Self { bindings }
    }

    /// Binding names, sorted
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.bindings.keys()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The whole context as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.bindings.as_ref().clone())
    }
}
