//! brickwork - a runtime for declarative brick pipelines

pub mod bricks;
pub mod cli;
pub mod core;
pub mod execution;
pub mod integration;
pub mod resolver;
pub mod variables;

// Re-export commonly used types
pub use bricks::{Brick, BrickArgs, BrickOptions, BrickRegistry, InMemoryBrickRegistry, InputSchema};
pub use crate::core::{BrickConfig, BrickId, ConfigValue, ExecutionContext, Expression, OutputKey};
pub use execution::{AbortSignal, BrickError, ErrorKind, ExecutionEvent, Reducer, RunOptions};
pub use integration::{IntegrationContext, IntegrationContextBuilder, StaticIntegrationResolver};
pub use resolver::{ApiVersion, BuiltinTemplateEngine, ExpressionResolver, TemplateEngine};
pub use variables::{InMemoryModVariableStore, ModVariableStore, Namespace};
