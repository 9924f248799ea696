//! Test: Reference runs - the four canonical pipelines end to end

use crate::helpers::*;
use brickwork::core::state::{ExecutionStatus, StepState};
use brickwork::{AbortSignal, ExecutionEvent, RunOptions};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Scenario A: a bound echo result echoed again comes out unchanged
#[tokio::test]
async fn test_scenario_a() {
    let reducer = reducer_with(Vec::new());
    let pipeline = vec![echo("hi").with_output_key("a"), echo(var("a"))];

    let output = reducer.run(&pipeline, json!({}), RunOptions::new()).await.unwrap();
    assert_eq!(output, json!({"message": "hi"}));
}

/// Echo accepts any message type once input validation is on
#[tokio::test]
async fn test_echo_accepts_structured_message() {
    let reducer = reducer_with(Vec::new());
    let pipeline = vec![echo(literal(json!({"items": [1, 2]})))];

    let output = reducer.run(&pipeline, json!({}), RunOptions::new()).await.unwrap();
    assert_eq!(output, json!({"message": {"items": [1, 2]}}));
}

/// Scenario B: a false condition with only an `if` branch yields null and binds nothing
#[tokio::test]
async fn test_scenario_b() {
    let reducer = reducer_with(Vec::new());
    let if_else = step("@brick/if-else")
        .with_config("condition", false)
        .with_config("if", pipeline(vec![echo("yes").with_output_key("inner")]));

    let output = reducer
        .run(&[if_else.clone()], json!({}), RunOptions::new())
        .await
        .unwrap();
    assert_eq!(output, Value::Null);

    let pipeline = vec![
        echo("before").with_output_key("a"),
        if_else,
        step("@brick/identity")
            .with_config("a", var("@a"))
            .with_config("inner", var("@inner")),
    ];
    let output = reducer.run(&pipeline, json!({}), RunOptions::new()).await.unwrap();
    assert_eq!(output, json!({"a": {"message": "before"}, "inner": null}));
}

/// Scenario C: the except branch echoes the caught message; the echoed
/// message is the thrown message string
#[tokio::test]
async fn test_scenario_c() {
    let reducer = reducer_with(Vec::new());
    let pipeline = vec![step("@brick/try-except")
        .with_config("try", pipeline(vec![throw("boom")]))
        .with_config("except", pipeline(vec![echo(var("@error.message"))]))];

    let output = reducer.run(&pipeline, json!({}), RunOptions::new()).await.unwrap();
    assert_eq!(output, json!({"message": "boom"}));
    assert_eq!(output["message"], json!("boom"));
}

/// Scenario D: an abort fired after step 1 stops steps 2 and 3
#[tokio::test]
async fn test_scenario_d() {
    let spy = SpyBrick::new("@test/spy", json!("ran"));
    let calls = spy.calls();
    let reducer = reducer_with(vec![Arc::new(spy)]);

    let signal = AbortSignal::new();
    let trigger = signal.clone();
    let recorder = EventRecorder::new();
    let record = recorder.options();
    let options = RunOptions::new()
        .with_abort_signal(signal.clone())
        .with_event_handler(move |event| {
            if let ExecutionEvent::StepStateChanged { frame, state: StepState::Completed { .. }, .. } = &event {
                if frame.step_index == 0 {
                    trigger.abort("stop before step 2");
                }
            }
            record.emit(event);
        });

    let pipeline = vec![step("@test/spy"), step("@test/spy"), step("@test/spy")];
    let err = reducer.run(&pipeline, json!({}), options).await.unwrap_err();

    assert_cancelled(&err);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.final_status(), Some(ExecutionStatus::Cancelled));
    assert_eq!(signal.reason(), Some("stop before step 2"));
}
