//! Core domain models
//!
//! This module defines the data structures a pipeline is made of: brick
//! invocations, expressions, the execution context and run state, plus
//! loading pipeline and runtime configuration from files.

pub mod brick_config;
pub mod condition;
pub mod config;
pub mod context;
pub mod expression;
pub mod state;

pub use brick_config::*;
pub use context::*;
pub use expression::*;
pub use state::*;
