use crate::bricks::{Brick, BrickArgs, BrickOptions, InputSchema, ValueKind};
use crate::core::brick_config::BrickId;
use crate::execution::errors::BrickError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Sleeps for `millis`; returns early with a cancellation if the run is aborted
pub struct WaitBrick;

#[async_trait]
impl Brick for WaitBrick {
    fn id(&self) -> BrickId {
        BrickId::from("@brick/wait")
    }

    fn name(&self) -> &str {
        "Wait"
    }

    fn description(&self) -> &str {
        "Pause the pipeline"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new().required("millis", ValueKind::Integer)
    }

    async fn run(&self, args: BrickArgs, options: BrickOptions<'_>) -> Result<Value, BrickError> {
        let millis = args.u64("millis")?.unwrap_or(0);
        options
            .abort_signal()
            .race(async {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(Value::Null)
            })
            .await
    }
}
