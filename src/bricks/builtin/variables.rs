//! Mod-variable bricks

use crate::bricks::{Brick, BrickArgs, BrickOptions, InputSchema, ValueKind};
use crate::core::brick_config::BrickId;
use crate::execution::errors::BrickError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

fn variable_name(args: &BrickArgs) -> Result<&str, BrickError> {
    args.string("variable")?
        .ok_or_else(|| BrickError::invalid_argument("variable", "required"))
}

pub struct SetModVariableBrick;

#[async_trait]
impl Brick for SetModVariableBrick {
    fn id(&self) -> BrickId {
        BrickId::from("@brick/mod-variable/set")
    }

    fn name(&self) -> &str {
        "Set Mod Variable"
    }

    fn description(&self) -> &str {
        "Set a mod variable; null clears it"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new()
            .required("variable", ValueKind::String)
            .optional("value", ValueKind::Any)
    }

    async fn run(&self, args: BrickArgs, options: BrickOptions<'_>) -> Result<Value, BrickError> {
        let name = variable_name(&args)?;
        let value = args.get("value").cloned().unwrap_or(Value::Null);
        options.mod_variables()?.set(name, value.clone()).await;
        Ok(value)
    }
}

pub struct GetModVariableBrick;

#[async_trait]
impl Brick for GetModVariableBrick {
    fn id(&self) -> BrickId {
        BrickId::from("@brick/mod-variable/get")
    }

    fn name(&self) -> &str {
        "Get Mod Variable"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new().required("variable", ValueKind::String)
    }

    async fn run(&self, args: BrickArgs, options: BrickOptions<'_>) -> Result<Value, BrickError> {
        let name = variable_name(&args)?;
        Ok(options.mod_variables()?.get(name).await.unwrap_or(Value::Null))
    }
}

/// Waits until a mod variable is set
pub struct WaitModVariableBrick;

#[async_trait]
impl Brick for WaitModVariableBrick {
    fn id(&self) -> BrickId {
        BrickId::from("@brick/mod-variable/wait")
    }

    fn name(&self) -> &str {
        "Wait for Mod Variable"
    }

    fn description(&self) -> &str {
        "Wait until a mod variable has a value, then return it"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new()
            .required("variable", ValueKind::String)
            .optional("timeoutMillis", ValueKind::Integer)
    }

    async fn run(&self, args: BrickArgs, options: BrickOptions<'_>) -> Result<Value, BrickError> {
        let name = variable_name(&args)?;
        let timeout = args.u64("timeoutMillis")?.map(Duration::from_millis);
        let mut receiver = options.mod_variables()?.watch().await;

        debug!(variable = name, ?timeout, "Waiting for mod variable");
        let wait = async move {
            loop {
                let current = receiver.borrow_and_update().get(name).filter(|v| !v.is_null()).cloned();
                if let Some(value) = current {
                    return Ok(value);
                }
                receiver
                    .changed()
                    .await
                    .map_err(|_| BrickError::application("mod variable store closed"))?;
            }
        };

        match timeout {
            Some(timeout) => options.abort_signal().race_timeout(wait, timeout).await,
            None => options.abort_signal().race(wait).await,
        }
    }
}
