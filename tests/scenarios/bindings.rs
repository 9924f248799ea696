//! Test: Bindings - outputs, variables and templates flowing between steps

use crate::helpers::*;
use brickwork::core::state::ExecutionStatus;
use brickwork::RunOptions;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// A bound output is reachable with and without the `@` prefix
#[tokio::test]
async fn test_output_key_lookup_with_and_without_prefix() {
    let reducer = reducer_with(Vec::new());

    for path in ["@a", "a"] {
        let pipeline = vec![echo("hi").with_output_key("a"), ret(var(path))];
        let output = reducer.run(&pipeline, Value::Null, RunOptions::new()).await.unwrap();
        assert_eq!(output, json!({"message": "hi"}), "lookup via {}", path);
    }
}

/// Templates see the input and earlier outputs
#[tokio::test]
async fn test_template_chain() {
    let reducer = reducer_with(Vec::new());
    let pipeline = vec![
        echo(nunjucks("Hello {{ @input.name | upper }}")).with_output_key("greeting"),
        ret(nunjucks("{{ @greeting.message }}, you have {{ @input.items | length }} items")),
    ];

    let output = reducer
        .run(&pipeline, json!({"name": "ada", "items": [1, 2, 3]}), RunOptions::new())
        .await
        .unwrap();

    assert_eq!(output, json!("Hello ADA, you have 3 items"));
}

/// A step cannot see outputs of steps after it
#[tokio::test]
async fn test_later_output_not_visible() {
    let spy = SpyBrick::new("@test/spy", json!("late"));
    let args = spy.recorded_args();
    let reducer = reducer_with(vec![Arc::new(spy)]);

    let pipeline = vec![
        ret(var("@late")),
        step("@test/spy").with_output_key("late"),
        ret(var("@late")),
    ];
    let recorder = EventRecorder::new();
    let output = reducer.run(&pipeline, Value::Null, recorder.options()).await.unwrap();

    assert_eq!(output, json!("late"));
    assert_eq!(args.lock().unwrap().len(), 1);
    assert_eq!(recorder.final_status(), Some(ExecutionStatus::Completed));
}

/// Same pipeline, same input, same output
#[tokio::test]
async fn test_runs_are_deterministic() {
    let reducer = reducer_with(Vec::new());
    let pipeline = vec![
        step("@brick/for-each")
            .with_config("elements", var("@input.words"))
            .with_config("body", pipeline(vec![ret(nunjucks("{{ @element | upper }}"))]))
            .with_output_key("shouted"),
        ret(nunjucks("{{ @shouted | dump }}")),
    ];
    let input = json!({"words": ["a", "b"]});

    let first = reducer.run(&pipeline, input.clone(), RunOptions::new()).await.unwrap();
    let second = reducer.run(&pipeline, input, RunOptions::new()).await.unwrap();

    assert_eq!(first, json!(r#"["A","B"]"#));
    assert_eq!(first, second);
}

/// Skipped steps leave the running value alone
#[tokio::test]
async fn test_skipped_steps_keep_previous_value() {
    let spy = SpyBrick::new("@test/spy", json!("never"));
    let calls = spy.calls();
    let reducer = reducer_with(vec![Arc::new(spy)]);

    let pipeline = vec![
        echo("kept"),
        step("@test/spy").with_condition(nunjucks("{{ @input.enabled }}")),
        step("@test/spy").with_condition("no"),
    ];
    let recorder = EventRecorder::new();
    let output = reducer
        .run(&pipeline, json!({"enabled": false}), recorder.options())
        .await
        .unwrap();

    assert_eq!(output, json!({"message": "kept"}));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        recorder.step_trace(),
        vec![
            "@brick/echo#0: running",
            "@brick/echo#0: completed",
            "@test/spy#1: skipped",
            "@test/spy#2: skipped",
        ]
    );
}
