//! Value bricks

use crate::bricks::{Brick, BrickArgs, BrickOptions, InputSchema, ValueKind};
use crate::core::brick_config::BrickId;
use crate::execution::errors::BrickError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Returns `{ message }`. A message that is already an echo result is
/// returned as-is, so echoing a bound echo output doesn't nest.
pub struct EchoBrick;

fn is_echo_result(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.len() == 1 && map.contains_key("message"))
}

#[async_trait]
impl Brick for EchoBrick {
    fn id(&self) -> BrickId {
        BrickId::from("@brick/echo")
    }

    fn name(&self) -> &str {
        "Echo"
    }

    fn description(&self) -> &str {
        "Return the message it was given"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new().required("message", ValueKind::Any)
    }

    async fn run(&self, args: BrickArgs, _options: BrickOptions<'_>) -> Result<Value, BrickError> {
        let message = args.require("message")?;
        if is_echo_result(message) {
            return Ok(message.clone());
        }
        Ok(json!({ "message": message }))
    }
}

/// Returns its resolved config unchanged
pub struct IdentityBrick;

#[async_trait]
impl Brick for IdentityBrick {
    fn id(&self) -> BrickId {
        BrickId::from("@brick/identity")
    }

    fn name(&self) -> &str {
        "Identity"
    }

    fn description(&self) -> &str {
        "Return the resolved config as the output"
    }

    async fn run(&self, args: BrickArgs, _options: BrickOptions<'_>) -> Result<Value, BrickError> {
        Ok(args.into_value())
    }
}

/// Returns `value`
pub struct ReturnBrick;

#[async_trait]
impl Brick for ReturnBrick {
    fn id(&self) -> BrickId {
        BrickId::from("@brick/return")
    }

    fn name(&self) -> &str {
        "Return"
    }

    fn description(&self) -> &str {
        "Return a value as the output"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new().optional("value", ValueKind::Any)
    }

    async fn run(&self, args: BrickArgs, _options: BrickOptions<'_>) -> Result<Value, BrickError> {
        Ok(args.get("value").cloned().unwrap_or(Value::Null))
    }
}

/// Raises a business error
pub struct ThrowBrick;

#[async_trait]
impl Brick for ThrowBrick {
    fn id(&self) -> BrickId {
        BrickId::from("@brick/throw")
    }

    fn name(&self) -> &str {
        "Throw"
    }

    fn description(&self) -> &str {
        "Fail with a business error"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new().required("message", ValueKind::String)
    }

    async fn run(&self, args: BrickArgs, _options: BrickOptions<'_>) -> Result<Value, BrickError> {
        let message = args.string("message")?.unwrap_or("Error");
        Err(BrickError::business(message))
    }
}
