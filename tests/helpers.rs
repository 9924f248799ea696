//! Test utilities for brickwork pipelines
#![allow(dead_code)]

use brickwork::bricks::{Brick, BrickArgs, BrickOptions, InMemoryBrickRegistry, InputSchema};
use brickwork::core::state::{ExecutionStatus, StepState};
use brickwork::execution::{BrickError, ErrorKind, ExecutionEvent, Reducer, RunOptions};
use brickwork::{BrickConfig, BrickId, ConfigValue, ExpressionResolver};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Brick that records every call and returns a fixed value
pub struct SpyBrick {
    id: &'static str,
    output: Value,
    calls: Arc<AtomicUsize>,
    args: Arc<Mutex<Vec<Value>>>,
}

impl SpyBrick {
    pub fn new(id: &'static str, output: Value) -> Self {
        Self {
            id,
            output,
            calls: Arc::new(AtomicUsize::new(0)),
            args: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn recorded_args(&self) -> Arc<Mutex<Vec<Value>>> {
        self.args.clone()
    }
}

#[async_trait]
impl Brick for SpyBrick {
    fn id(&self) -> BrickId {
        BrickId::from(self.id)
    }

    fn name(&self) -> &str {
        "Spy"
    }

    async fn run(&self, args: BrickArgs, _options: BrickOptions<'_>) -> Result<Value, BrickError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.args.lock().unwrap().push(args.into_value());
        Ok(self.output.clone())
    }
}

/// Brick that fires the run's abort signal the first time it runs
pub struct AbortingBrick {
    calls: Arc<AtomicUsize>,
}

impl AbortingBrick {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Brick for AbortingBrick {
    fn id(&self) -> BrickId {
        BrickId::from("@test/abort")
    }

    fn name(&self) -> &str {
        "Abort"
    }

    async fn run(&self, _args: BrickArgs, options: BrickOptions<'_>) -> Result<Value, BrickError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            options.abort_signal().abort("stopped by test");
        }
        Ok(json!("aborted"))
    }
}

/// Brick that fails with an application error (a defect, not a user error)
pub struct DefectBrick;

#[async_trait]
impl Brick for DefectBrick {
    fn id(&self) -> BrickId {
        BrickId::from("@test/defect")
    }

    fn name(&self) -> &str {
        "Defect"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new()
    }

    async fn run(&self, _args: BrickArgs, _options: BrickOptions<'_>) -> Result<Value, BrickError> {
        Err(BrickError::application("index out of bounds"))
    }
}

/// Reducer with the builtin bricks plus `extra`
pub fn reducer_with(extra: Vec<Arc<dyn Brick>>) -> Reducer {
    let mut registry = InMemoryBrickRegistry::with_builtins();
    for brick in extra {
        registry.register(brick);
    }
    Reducer::new(Arc::new(registry), ExpressionResolver::default())
}

/// Collects every event a run emits
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<ExecutionEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run options wired to this recorder
    pub fn options(&self) -> RunOptions {
        let events = self.events.clone();
        RunOptions::new().with_event_handler(move |event| events.lock().unwrap().push(event))
    }

    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().unwrap().clone()
    }

    /// `path: STATE` for every step event, in emission order
    pub fn step_trace(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|event| match event {
                ExecutionEvent::StepStateChanged { path, state, .. } => {
                    Some(format!("{}: {}", path, state_label(state)))
                }
                _ => None,
            })
            .collect()
    }

    pub fn final_status(&self) -> Option<ExecutionStatus> {
        self.events().iter().rev().find_map(|event| match event {
            ExecutionEvent::RunCompleted { state, .. } => Some(state.status),
            _ => None,
        })
    }
}

pub fn state_label(state: &StepState) -> &'static str {
    match state {
        StepState::Pending => "pending",
        StepState::Running { .. } => "running",
        StepState::Completed { .. } => "completed",
        StepState::Skipped { .. } => "skipped",
        StepState::Failed { .. } => "failed",
    }
}

// Pipeline builders

pub fn step(id: &str) -> BrickConfig {
    BrickConfig::new(id)
}

pub fn echo(message: impl Into<ConfigValue>) -> BrickConfig {
    step("@brick/echo").with_config("message", message)
}

pub fn ret(value: impl Into<ConfigValue>) -> BrickConfig {
    step("@brick/return").with_config("value", value)
}

pub fn throw(message: &str) -> BrickConfig {
    step("@brick/throw").with_config("message", message)
}

pub fn var(path: &str) -> ConfigValue {
    ConfigValue::var(path)
}

pub fn nunjucks(template: &str) -> ConfigValue {
    ConfigValue::nunjucks(template)
}

pub fn pipeline(steps: Vec<BrickConfig>) -> ConfigValue {
    ConfigValue::pipeline(steps)
}

pub fn literal(value: Value) -> ConfigValue {
    ConfigValue::literal(value)
}

// Assertions

/// Assert a business error whose root message is `message`
pub fn assert_business_error(err: &BrickError, message: &str) {
    assert_eq!(err.kind(), ErrorKind::Business, "unexpected error: {}", err);
    assert_eq!(err.root().to_string(), message);
}

pub fn assert_cancelled(err: &BrickError) {
    assert!(err.is_cancel(), "expected cancellation, got: {}", err);
    assert!(err.path().is_empty(), "cancellation must not carry a path");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spy_brick_records_calls() {
        let spy = SpyBrick::new("@test/spy", json!(1));
        let calls = spy.calls();
        let args = spy.recorded_args();
        let reducer = reducer_with(vec![Arc::new(spy)]);

        let pipeline = vec![step("@test/spy").with_config("x", literal(json!(2)))];
        let output = reducer.run(&pipeline, Value::Null, RunOptions::new()).await.unwrap();

        assert_eq!(output, json!(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(args.lock().unwrap()[0], json!({"x": 2}));
    }
}
