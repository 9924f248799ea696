//! Mod variables - shared state between runs of the same mod
//!
//! Variables are namespaced per mod and component. Writes are last-writer
//! wins; readers take a snapshot or subscribe to changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::debug;

/// Where a set of mod variables lives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub mod_id: String,
    pub component_id: Option<String>,
}

impl Namespace {
    pub fn new(mod_id: impl Into<String>) -> Self {
        Self {
            mod_id: mod_id.into(),
            component_id: None,
        }
    }

    pub fn component(mod_id: impl Into<String>, component_id: impl Into<String>) -> Self {
        Self {
            mod_id: mod_id.into(),
            component_id: Some(component_id.into()),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.component_id {
            Some(component_id) => write!(f, "{}/{}", self.mod_id, component_id),
            None => f.write_str(&self.mod_id),
        }
    }
}

/// Storage for mod variables
#[async_trait]
pub trait ModVariableStore: Send + Sync {
    /// All variables in a namespace
    async fn snapshot(&self, namespace: &Namespace) -> Map<String, Value>;

    /// One variable, `None` when unset
    async fn get(&self, namespace: &Namespace, name: &str) -> Option<Value>;

    /// Set a variable; `null` removes it
    async fn set(&self, namespace: &Namespace, name: &str, value: Value);

    /// Subscribe to changes in a namespace
    async fn watch(&self, namespace: &Namespace) -> watch::Receiver<Map<String, Value>>;
}

/// In-memory store built on `tokio::sync::watch` channels
#[derive(Default)]
pub struct InMemoryModVariableStore {
    namespaces: Mutex<HashMap<Namespace, watch::Sender<Map<String, Value>>>>,
}

impl InMemoryModVariableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModVariableStore for InMemoryModVariableStore {
    async fn snapshot(&self, namespace: &Namespace) -> Map<String, Value> {
        let namespaces = self.namespaces.lock().await;
        namespaces
            .get(namespace)
            .map(|sender| sender.borrow().clone())
            .unwrap_or_default()
    }

    async fn get(&self, namespace: &Namespace, name: &str) -> Option<Value> {
        let namespaces = self.namespaces.lock().await;
        namespaces
            .get(namespace)
            .and_then(|sender| sender.borrow().get(name).cloned())
    }

    async fn set(&self, namespace: &Namespace, name: &str, value: Value) {
        let mut namespaces = self.namespaces.lock().await;
        let sender = namespaces
            .entry(namespace.clone())
            .or_insert_with(|| watch::channel(Map::new()).0);

        debug!(namespace = %namespace, name, "Setting mod variable");
        sender.send_modify(|variables| {
            if value.is_null() {
                variables.remove(name);
            } else {
                variables.insert(name.to_string(), value);
            }
        });
    }

    async fn watch(&self, namespace: &Namespace) -> watch::Receiver<Map<String, Value>> {
        let mut namespaces = self.namespaces.lock().await;
        namespaces
            .entry(namespace.clone())
            .or_insert_with(|| watch::channel(Map::new()).0)
            .subscribe()
    }
}

/// A store bound to one namespace, as handed to a run
#[derive(Clone)]
pub struct ModVariableHandle {
    store: Arc<dyn ModVariableStore>,
    namespace: Namespace,
}

impl ModVariableHandle {
    pub fn new(store: Arc<dyn ModVariableStore>, namespace: Namespace) -> Self {
        Self { store, namespace }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub async fn snapshot(&self) -> Map<String, Value> {
        self.store.snapshot(&self.namespace).await
    }

    pub async fn get(&self, name: &str) -> Option<Value> {
        self.store.get(&self.namespace, name).await
    }

    pub async fn set(&self, name: &str, value: Value) {
        self.store.set(&self.namespace, name, value).await
    }

    pub async fn watch(&self) -> watch::Receiver<Map<String, Value>> {
        self.store.watch(&self.namespace).await
    }
}

impl fmt::Debug for ModVariableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModVariableHandle")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
