//! Test: Mod variables - shared state between runs of a mod

use crate::helpers::*;
use brickwork::execution::ErrorKind;
use brickwork::variables::ModVariableHandle;
use brickwork::{InMemoryModVariableStore, ModVariableStore, Namespace, RunOptions};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn options_with_store(store: Arc<InMemoryModVariableStore>) -> RunOptions {
    RunOptions::new().with_mod_variables(ModVariableHandle::new(store, Namespace::new("@acme/counter")))
}

fn set_variable(name: &str, value: serde_json::Value) -> brickwork::BrickConfig {
    step("@brick/mod-variable/set")
        .with_config("variable", name)
        .with_config("value", literal(value))
}

/// Later steps see variables set by earlier ones through `@mod`
#[tokio::test]
async fn test_set_is_visible_in_mod_binding() {
    let store = Arc::new(InMemoryModVariableStore::new());
    let reducer = reducer_with(Vec::new());

    let pipeline = vec![
        set_variable("count", json!(3)),
        ret(nunjucks("count={{ @mod.count }}")),
    ];
    let output = reducer
        .run(&pipeline, Value::Null, options_with_store(store.clone()))
        .await
        .unwrap();

    assert_eq!(output, json!("count=3"));
    let namespace = Namespace::new("@acme/counter");
    assert_eq!(store.get(&namespace, "count").await, Some(json!(3)));
}

/// Setting null clears the variable
#[tokio::test]
async fn test_set_null_clears() {
    let store = Arc::new(InMemoryModVariableStore::new());
    let reducer = reducer_with(Vec::new());

    let pipeline = vec![
        set_variable("flag", json!(true)),
        set_variable("flag", Value::Null),
        step("@brick/mod-variable/get").with_config("variable", "flag"),
    ];
    let output = reducer.run(&pipeline, Value::Null, options_with_store(store)).await.unwrap();

    assert_eq!(output, Value::Null);
}

/// A wait resolves once another party sets the variable
#[tokio::test]
async fn test_wait_resolves_when_set() {
    let store = Arc::new(InMemoryModVariableStore::new());
    let reducer = reducer_with(Vec::new());

    let writer = store.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        writer.set(&Namespace::new("@acme/counter"), "ready", json!("go")).await;
    });

    let pipeline = vec![step("@brick/mod-variable/wait")
        .with_config("variable", "ready")
        .with_config("timeoutMillis", literal(json!(5_000)))];
    let output = reducer.run(&pipeline, Value::Null, options_with_store(store)).await.unwrap();

    assert_eq!(output, json!("go"));
}

/// A wait gives up after its timeout, as a catchable error
#[tokio::test]
async fn test_wait_timeout_is_catchable() {
    let store = Arc::new(InMemoryModVariableStore::new());
    let reducer = reducer_with(Vec::new());

    let wait = step("@brick/mod-variable/wait")
        .with_config("variable", "never")
        .with_config("timeoutMillis", literal(json!(10)));
    let pipeline = vec![step("@brick/try-except")
        .with_config("try", pipeline(vec![wait]))
        .with_config("except", pipeline(vec![ret(var("@error.name"))]))];

    let output = reducer.run(&pipeline, Value::Null, options_with_store(store)).await.unwrap();
    assert_eq!(output, json!("TimeoutError"));
}

/// Without a store the bricks fail as a defect
#[tokio::test]
async fn test_missing_store_is_application_error() {
    let reducer = reducer_with(Vec::new());
    let pipeline = vec![step("@brick/mod-variable/get").with_config("variable", "x")];

    let err = reducer.run(&pipeline, Value::Null, RunOptions::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Application);
}
