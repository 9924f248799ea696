//! Control-flow bricks
//!
//! These receive their branches as unresolved `pipeline` expressions and
//! run them through [`BrickOptions::run_pipeline`], so every branch gets
//! its own scope and its own segment in error paths.

use crate::bricks::{Brick, BrickArgs, BrickOptions, InputSchema, ValueKind};
use crate::core::brick_config::{BrickId, OutputKey};
use crate::core::condition::is_truthy;
use crate::execution::errors::{Branch, BrickError};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

const DEFAULT_ELEMENT_KEY: &str = "element";
const DEFAULT_ERROR_KEY: &str = "error";

/// Bind name for a user-chosen key, rejecting anything that isn't an identifier
fn binding_for(arg: &str, key: &str) -> Result<String, BrickError> {
    let key = OutputKey::from(key);
    if !key.is_valid() {
        return Err(BrickError::invalid_argument(arg, format!("'{}' is not a valid variable name", key)));
    }
    Ok(key.binding())
}

/// Runs exactly one of two branches
pub struct IfElseBrick;

#[async_trait]
impl Brick for IfElseBrick {
    fn id(&self) -> BrickId {
        BrickId::from("@brick/if-else")
    }

    fn name(&self) -> &str {
        "If-Else"
    }

    fn description(&self) -> &str {
        "Run the if branch when the condition is truthy, otherwise the else branch"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new()
            .optional("condition", ValueKind::Any)
            .optional("if", ValueKind::Pipeline)
            .optional("else", ValueKind::Pipeline)
    }

    async fn run(&self, args: BrickArgs, options: BrickOptions<'_>) -> Result<Value, BrickError> {
        let condition = args.get("condition").map(is_truthy).unwrap_or(false);
        let (key, pipeline) = if condition {
            ("if", args.pipeline("if")?)
        } else {
            ("else", args.pipeline("else")?)
        };

        debug!(condition, branch = key, "If-else branch selected");
        match pipeline {
            Some(pipeline) => options.run_pipeline(&pipeline, Branch::new(key), Vec::new()).await,
            None => Ok(Value::Null),
        }
    }
}

/// Runs a body once per element, collecting the results in order
pub struct ForEachBrick;

#[async_trait]
impl Brick for ForEachBrick {
    fn id(&self) -> BrickId {
        BrickId::from("@brick/for-each")
    }

    fn name(&self) -> &str {
        "For-Each"
    }

    fn description(&self) -> &str {
        "Run the body for each element; stops at the first failure"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new()
            .required("elements", ValueKind::Array)
            .optional("elementKey", ValueKind::String)
            .describe("Variable the current element is bound to (default: element)")
            .required("body", ValueKind::Pipeline)
    }

    async fn run(&self, args: BrickArgs, options: BrickOptions<'_>) -> Result<Value, BrickError> {
        let elements = match args.require("elements")? {
            Value::Array(elements) => elements.clone(),
            _ => return Err(BrickError::invalid_argument("elements", "expected an array")),
        };
        let element_binding = binding_for("elementKey", args.string("elementKey")?.unwrap_or(DEFAULT_ELEMENT_KEY))?;
        let body = args
            .pipeline("body")?
            .ok_or_else(|| BrickError::invalid_argument("body", "required"))?;

        let mut results = Vec::with_capacity(elements.len());
        for (index, element) in elements.into_iter().enumerate() {
            options.abort_signal().check()?;
            let bindings = vec![(element_binding.clone(), element), ("@index".to_string(), json!(index))];
            let result = options
                .run_pipeline(&body, Branch::indexed("body", index), bindings)
                .await?;
            results.push(result);
        }

        Ok(Value::Array(results))
    }
}

/// Runs `try`; on failure runs `except` once with the error bound
pub struct TryExceptBrick;

#[async_trait]
impl Brick for TryExceptBrick {
    fn id(&self) -> BrickId {
        BrickId::from("@brick/try-except")
    }

    fn name(&self) -> &str {
        "Try-Except"
    }

    fn description(&self) -> &str {
        "Recover from errors raised by the try branch"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new()
            .required("try", ValueKind::Pipeline)
            .optional("except", ValueKind::Pipeline)
            .optional("errorKey", ValueKind::String)
            .describe("Variable the error is bound to (default: error)")
    }

    async fn run(&self, args: BrickArgs, options: BrickOptions<'_>) -> Result<Value, BrickError> {
        let try_branch = args
            .pipeline("try")?
            .ok_or_else(|| BrickError::invalid_argument("try", "required"))?;
        let except_branch = args.pipeline("except")?;
        let error_binding = binding_for("errorKey", args.string("errorKey")?.unwrap_or(DEFAULT_ERROR_KEY))?;

        let error = match options.run_pipeline(&try_branch, Branch::new("try"), Vec::new()).await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_cancel() => return Err(error),
            Err(error) => error,
        };

        warn!(
            kind = %error.kind(),
            path = %error.path_string(),
            "Recovering from error: {}",
            error.root()
        );

        match except_branch {
            Some(pipeline) => {
                let bindings = vec![(error_binding, error.to_context_value())];
                options.run_pipeline(&pipeline, Branch::new("except"), bindings).await
            }
            None => Ok(Value::Null),
        }
    }
}
