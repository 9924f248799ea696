//! Test: Cancellation - abort signal and timeouts

use crate::helpers::*;
use brickwork::core::state::ExecutionStatus;
use brickwork::execution::ErrorKind;
use brickwork::{AbortSignal, BrickError};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Aborting stops the run before the next step
#[tokio::test]
async fn test_abort_stops_before_next_step() {
    let aborter = AbortingBrick::new();
    let abort_calls = aborter.calls();
    let spy = SpyBrick::new("@test/spy", json!(null));
    let spy_calls = spy.calls();
    let reducer = reducer_with(vec![Arc::new(aborter), Arc::new(spy)]);

    let pipeline = vec![step("@test/abort"), step("@test/spy")];
    let recorder = EventRecorder::new();
    let err = reducer.run(&pipeline, Value::Null, recorder.options()).await.unwrap_err();

    assert_cancelled(&err);
    assert_eq!(abort_calls.load(Ordering::SeqCst), 1);
    assert_eq!(spy_calls.load(Ordering::SeqCst), 0);
    assert_eq!(recorder.final_status(), Some(ExecutionStatus::Cancelled));
}

/// Try-except never swallows a cancellation
#[tokio::test]
async fn test_try_except_does_not_catch_cancel() {
    let handler = SpyBrick::new("@test/handler", json!("handled"));
    let handler_calls = handler.calls();
    let reducer = reducer_with(vec![Arc::new(AbortingBrick::new()), Arc::new(handler)]);

    let pipeline = vec![step("@brick/try-except")
        .with_config("try", pipeline(vec![step("@test/abort"), echo("unreachable")]))
        .with_config("except", pipeline(vec![step("@test/handler")]))];

    let err = reducer
        .run(&pipeline, Value::Null, brickwork::RunOptions::new())
        .await
        .unwrap_err();

    assert_cancelled(&err);
    assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
}

/// A for-each loop checks the signal between iterations
#[tokio::test]
async fn test_for_each_stops_on_abort() {
    let aborter = AbortingBrick::new();
    let calls = aborter.calls();
    let reducer = reducer_with(vec![Arc::new(aborter)]);

    let pipeline = vec![step("@brick/for-each")
        .with_config("elements", literal(json!([1, 2, 3])))
        .with_config("body", pipeline(vec![step("@test/abort")]))];

    let err = reducer
        .run(&pipeline, Value::Null, brickwork::RunOptions::new())
        .await
        .unwrap_err();

    assert_cancelled(&err);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// An in-flight wait is interrupted by the signal
#[tokio::test]
async fn test_abort_interrupts_wait() {
    let reducer = reducer_with(Vec::new());
    let signal = AbortSignal::new();
    let options = EventRecorder::new().options().with_abort_signal(signal.clone());

    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.abort("user pressed stop");
    });

    let started = Instant::now();
    let pipeline = vec![step("@brick/wait").with_config("millis", literal(json!(10_000)))];
    let err = reducer.run(&pipeline, Value::Null, options).await.unwrap_err();

    assert_cancelled(&err);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(signal.reason(), Some("user pressed stop"));
}

/// A run raced against a timer fails as a timeout, not a cancellation
#[tokio::test]
async fn test_run_timeout() {
    let reducer = reducer_with(Vec::new());
    let signal = AbortSignal::new();
    let options = brickwork::RunOptions::new().with_abort_signal(signal.clone());

    let pipeline = vec![step("@brick/wait").with_config("millis", literal(json!(10_000)))];
    let err = signal
        .race_timeout(reducer.run(&pipeline, Value::Null, options), Duration::from_millis(20))
        .await
        .unwrap_err();

    assert!(matches!(err, BrickError::Timeout(_)));
    assert_eq!(err.kind(), ErrorKind::Business);
    assert!(!signal.is_aborted());
}
