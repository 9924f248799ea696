//! Test: Control flow - if-else, for-each and try-except

use crate::helpers::*;
use brickwork::execution::ErrorKind;
use brickwork::RunOptions;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// A false condition with no else branch yields null
#[tokio::test]
async fn test_if_else_without_else_branch() {
    let reducer = reducer_with(Vec::new());
    let pipeline = vec![step("@brick/if-else")
        .with_config("condition", false)
        .with_config("if", pipeline(vec![echo("yes")]))];

    let output = reducer.run(&pipeline, Value::Null, RunOptions::new()).await.unwrap();
    assert_eq!(output, Value::Null);
}

/// Exactly one branch runs
#[tokio::test]
async fn test_if_else_runs_one_branch() {
    let if_spy = SpyBrick::new("@test/if", json!("if"));
    let else_spy = SpyBrick::new("@test/else", json!("else"));
    let (if_calls, else_calls) = (if_spy.calls(), else_spy.calls());
    let reducer = reducer_with(vec![Arc::new(if_spy), Arc::new(else_spy)]);

    let pipeline = vec![step("@brick/if-else")
        .with_config("condition", nunjucks("{{ @input.flag }}"))
        .with_config("if", pipeline(vec![step("@test/if")]))
        .with_config("else", pipeline(vec![step("@test/else")]))];

    let output = reducer
        .run(&pipeline, json!({"flag": "off"}), RunOptions::new())
        .await
        .unwrap();

    assert_eq!(output, json!("else"));
    assert_eq!(if_calls.load(Ordering::SeqCst), 0);
    assert_eq!(else_calls.load(Ordering::SeqCst), 1);
}

/// Body results are collected in element order with the index bound
#[tokio::test]
async fn test_for_each_preserves_order() {
    let reducer = reducer_with(Vec::new());
    let pipeline = vec![step("@brick/for-each")
        .with_config("elements", var("@input"))
        .with_config("elementKey", "item")
        .with_config("body", pipeline(vec![ret(nunjucks("{{ @index }}:{{ @item }}"))]))];

    let output = reducer
        .run(&pipeline, json!(["a", "b", "c"]), RunOptions::new())
        .await
        .unwrap();

    assert_eq!(output, json!(["0:a", "1:b", "2:c"]));
}

/// Element bindings stay inside the body
#[tokio::test]
async fn test_for_each_bindings_do_not_leak() {
    let reducer = reducer_with(Vec::new());
    let pipeline = vec![
        step("@brick/for-each")
            .with_config("elements", literal(json!([1])))
            .with_config("body", pipeline(vec![echo("inner").with_output_key("inner")])),
        ret(var("@inner")),
    ];

    let output = reducer.run(&pipeline, Value::Null, RunOptions::new()).await.unwrap();
    assert_eq!(output, Value::Null);
}

/// The first failing iteration stops the loop and shows up in the path
#[tokio::test]
async fn test_for_each_failure_path() {
    let spy = SpyBrick::new("@test/spy", json!(null));
    let calls = spy.calls();
    let reducer = reducer_with(vec![Arc::new(spy)]);

    let pipeline = vec![step("@brick/for-each")
        .with_config("elements", literal(json!([10, 20, 30])))
        .with_config(
            "body",
            pipeline(vec![
                step("@test/spy"),
                throw("bad element").with_condition(var("@index")),
            ]),
        )];

    let err = reducer.run(&pipeline, Value::Null, RunOptions::new()).await.unwrap_err();

    assert_business_error(&err, "bad element");
    assert_eq!(err.path_string(), "@brick/for-each#0 > body[1] > @brick/throw#1");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// The except branch sees the error and its result is the brick's result
#[tokio::test]
async fn test_try_except_binds_error() {
    let reducer = reducer_with(Vec::new());
    let pipeline = vec![step("@brick/try-except")
        .with_config("try", pipeline(vec![throw("boom")]))
        .with_config("except", pipeline(vec![ret(var("@error.message"))]))];

    let output = reducer.run(&pipeline, Value::Null, RunOptions::new()).await.unwrap();
    assert_eq!(output, json!("boom"));
}

/// The full error object, under a custom key
#[tokio::test]
async fn test_try_except_error_shape() {
    let reducer = reducer_with(Vec::new());
    let pipeline = vec![step("@brick/try-except")
        .with_config("try", pipeline(vec![echo("ok"), throw("boom")]))
        .with_config("errorKey", "failure")
        .with_config("except", pipeline(vec![ret(var("@failure"))]))];

    let output = reducer.run(&pipeline, Value::Null, RunOptions::new()).await.unwrap();
    assert_eq!(
        output,
        json!({
            "name": "BusinessError",
            "kind": "business",
            "message": "boom",
            "path": ["try > @brick/throw#1"],
        })
    );
}

/// The except branch runs once, and a failure inside it propagates
#[tokio::test]
async fn test_try_except_runs_handler_once() {
    let spy = SpyBrick::new("@test/handler", json!("handled"));
    let calls = spy.calls();
    let reducer = reducer_with(vec![Arc::new(spy), Arc::new(DefectBrick)]);

    let pipeline = vec![step("@brick/try-except")
        .with_config("try", pipeline(vec![step("@test/defect")]))
        .with_config("except", pipeline(vec![step("@test/handler"), throw("handler failed")]))];

    let err = reducer.run(&pipeline, Value::Null, RunOptions::new()).await.unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_business_error(&err, "handler failed");
    assert_eq!(err.path_string(), "@brick/try-except#0 > except > @brick/throw#1");
}

/// Defects caught by try-except still carry their classification
#[tokio::test]
async fn test_try_except_exposes_defect_kind() {
    let reducer = reducer_with(vec![Arc::new(DefectBrick)]);
    let pipeline = vec![step("@brick/try-except")
        .with_config("try", pipeline(vec![step("@test/defect")]))
        .with_config("except", pipeline(vec![ret(var("@error.kind"))]))];

    let output = reducer.run(&pipeline, Value::Null, RunOptions::new()).await.unwrap();
    assert_eq!(output, json!("application"));
}

/// Uncaught defects surface with a generic user message
#[tokio::test]
async fn test_uncaught_defect_hides_detail() {
    let reducer = reducer_with(vec![Arc::new(DefectBrick)]);
    let pipeline = vec![step("@brick/if-else")
        .with_config("condition", true)
        .with_config("if", pipeline(vec![step("@test/defect")]))];

    let err = reducer.run(&pipeline, Value::Null, RunOptions::new()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Application);
    assert!(err.should_report());
    assert_eq!(err.user_message().as_deref(), Some("An unexpected error occurred"));
    assert_eq!(err.path_string(), "@brick/if-else#0 > if > @test/defect#0");
}

/// Nested steps report their depth and full path
#[tokio::test]
async fn test_nested_events_carry_path() {
    let reducer = reducer_with(Vec::new());
    let pipeline = vec![step("@brick/for-each")
        .with_config("elements", literal(json!([1, 2])))
        .with_config("body", pipeline(vec![echo("x")]))];

    let recorder = EventRecorder::new();
    reducer.run(&pipeline, Value::Null, recorder.options()).await.unwrap();

    assert_eq!(
        recorder.step_trace(),
        vec![
            "@brick/for-each#0: running",
            "@brick/for-each#0 > body[0] > @brick/echo#0: running",
            "@brick/for-each#0 > body[0] > @brick/echo#0: completed",
            "@brick/for-each#0 > body[1] > @brick/echo#0: running",
            "@brick/for-each#0 > body[1] > @brick/echo#0: completed",
            "@brick/for-each#0: completed",
        ]
    );
}
