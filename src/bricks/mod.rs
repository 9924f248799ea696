//! Brick abstraction - the reusable operations a pipeline is made of

pub mod builtin;
pub mod registry;
pub mod schema;

pub use registry::{BrickRegistry, InMemoryBrickRegistry};
pub use schema::{InputSchema, PropertySchema, ValueKind};

use crate::core::brick_config::{BrickConfig, BrickId};
use crate::core::context::ExecutionContext;
use crate::core::expression::Expression;
use crate::execution::errors::{Branch, BrickError, StepFrame};
use crate::execution::options::{AbortSignal, RunOptions};
use crate::execution::reducer::Reducer;
use crate::integration::SecretValue;
use crate::variables::ModVariableHandle;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A reusable operation
#[async_trait]
pub trait Brick: Send + Sync {
    /// Registry id, e.g. `@brick/echo`
    fn id(&self) -> BrickId;

    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new()
    }

    /// Run the brick with resolved arguments
    async fn run(&self, args: BrickArgs, options: BrickOptions<'_>) -> Result<Value, BrickError>;
}

/// Resolved arguments passed to a brick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrickArgs(Map<String, Value>);

impl BrickArgs {
    pub fn new(args: Map<String, Value>) -> Self {
        Self(args)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn require(&self, key: &str) -> Result<&Value, BrickError> {
        self.get(key)
            .ok_or_else(|| BrickError::invalid_argument(key, "required"))
    }

    pub fn string(&self, key: &str) -> Result<Option<&str>, BrickError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(BrickError::invalid_argument(key, "expected a string")),
        }
    }

    pub fn u64(&self, key: &str) -> Result<Option<u64>, BrickError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| BrickError::invalid_argument(key, "expected a non-negative integer")),
        }
    }

    /// A `pipeline` expression argument, decoded for execution
    pub fn pipeline(&self, key: &str) -> Result<Option<Vec<BrickConfig>>, BrickError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        match serde_json::from_value::<Expression>(value.clone()) {
            Ok(Expression::Pipeline(pipeline)) => Ok(Some(pipeline)),
            Ok(other) => Err(BrickError::invalid_argument(
                key,
                format!("expected a pipeline, got a {} expression", other.type_name()),
            )),
            Err(e) => Err(BrickError::invalid_argument(key, format!("expected a pipeline: {}", e))),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// What a running brick can reach: the context it was resolved against,
/// the run options, and the reducer for nested pipelines
pub struct BrickOptions<'a> {
    reducer: &'a Reducer,
    pub context: &'a ExecutionContext,
    pub run: &'a RunOptions,
    pub frame: &'a StepFrame,
}

impl<'a> BrickOptions<'a> {
    pub fn new(
        reducer: &'a Reducer,
        context: &'a ExecutionContext,
        run: &'a RunOptions,
        frame: &'a StepFrame,
    ) -> Self {
        Self {
            reducer,
            context,
            run,
            frame,
        }
    }

    /// Run a sub-pipeline in a child scope of this step. `bindings` are
    /// added to the child context only.
    pub async fn run_pipeline(
        &self,
        pipeline: &[BrickConfig],
        branch: Branch,
        bindings: Vec<(String, Value)>,
    ) -> Result<Value, BrickError> {
        let context = self.context.with_bindings(bindings);
        let options = self.run.descend(self.frame);
        self.reducer
            .run_scope(pipeline, context, Value::Null, options, Some(branch))
            .await
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.run.abort_signal
    }

    /// Secret of the integration bound under `output_key`
    pub fn integration_secret(&self, output_key: &str, name: &str) -> Option<&SecretValue> {
        self.run.integrations.secret(output_key, name)
    }

    pub fn mod_variables(&self) -> Result<&ModVariableHandle, BrickError> {
        self.run
            .mod_variables
            .as_ref()
            .ok_or_else(|| BrickError::application("mod variables are not available in this run"))
    }
}
