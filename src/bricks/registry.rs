//! Brick registry - resolves brick ids to implementations

use super::builtin;
use super::Brick;
use crate::core::brick_config::BrickId;
use crate::execution::errors::BrickError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Looks up bricks by id
pub trait BrickRegistry: Send + Sync {
    fn lookup(&self, id: &BrickId) -> Result<Arc<dyn Brick>, BrickError>;

    /// All registered ids, sorted
    fn ids(&self) -> Vec<BrickId>;
}

/// Registry held in memory
#[derive(Default)]
pub struct InMemoryBrickRegistry {
    bricks: HashMap<BrickId, Arc<dyn Brick>>,
}

impl InMemoryBrickRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the builtin bricks loaded
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for brick in builtin::all() {
            registry.register(brick);
        }
        registry
    }

    /// Register a brick, replacing any brick with the same id
    pub fn register(&mut self, brick: Arc<dyn Brick>) {
        let id = brick.id();
        debug!(brick_id = %id, "Registering brick");
        self.bricks.insert(id, brick);
    }

    pub fn len(&self) -> usize {
        self.bricks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bricks.is_empty()
    }
}

impl BrickRegistry for InMemoryBrickRegistry {
    fn lookup(&self, id: &BrickId) -> Result<Arc<dyn Brick>, BrickError> {
        self.bricks
            .get(id)
            .cloned()
            .ok_or_else(|| BrickError::NotFound(id.clone()))
    }

    fn ids(&self) -> Vec<BrickId> {
        let mut ids: Vec<BrickId> = self.bricks.keys().cloned().collect();
        ids.sort();
        ids
    }
}
