//! Pipeline reducer - runs a pipeline one step at a time
//!
//! Each step resolves its config against the context built so far, looks
//! its brick up in the registry and runs it. A step's output becomes the
//! running value and, if the step has an output key, a new binding for the
//! steps after it. Control-flow bricks call back into the reducer through
//! [`BrickOptions::run_pipeline`] to run their branches in child scopes.

use crate::bricks::{BrickArgs, BrickOptions, BrickRegistry, InMemoryBrickRegistry};
use crate::core::brick_config::{for_each_brick, BrickConfig, BrickId, OutputKey};
use crate::core::condition::is_truthy;
use crate::core::context::{ExecutionContext, INPUT_KEY, MOD_KEY, OPTIONS_KEY};
use crate::core::state::{RunState, StepState};
use crate::execution::errors::{Branch, BrickError, ErrorKind, StepFrame};
use crate::execution::events::ExecutionEvent;
use crate::execution::options::RunOptions;
use crate::resolver::ExpressionResolver;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

enum StepOutcome {
    Completed(Value),
    Skipped,
}

/// Pipeline interpreter. Cheap to share: independent runs may use one
/// reducer concurrently.
#[derive(Clone)]
pub struct Reducer {
    registry: Arc<dyn BrickRegistry>,
    resolver: ExpressionResolver,
}

impl Reducer {
    pub fn new(registry: Arc<dyn BrickRegistry>, resolver: ExpressionResolver) -> Self {
        Self { registry, resolver }
    }

    /// Reducer over the builtin bricks and the builtin template engine
    pub fn with_builtins() -> Self {
        Self::new(
            Arc::new(InMemoryBrickRegistry::with_builtins()),
            ExpressionResolver::default(),
        )
    }

    pub fn registry(&self) -> &dyn BrickRegistry {
        self.registry.as_ref()
    }

    pub fn resolver(&self) -> &ExpressionResolver {
        &self.resolver
    }

    /// Brick ids referenced by the pipeline that the registry doesn't know
    pub fn unknown_bricks(&self, pipeline: &[BrickConfig]) -> Vec<BrickId> {
        let mut unknown = BTreeSet::new();
        for_each_brick(pipeline, &mut |config| {
            if self.registry.lookup(&config.id).is_err() {
                unknown.insert(config.id.clone());
            }
        });
        unknown.into_iter().collect()
    }

    /// Run a pipeline to completion.
    ///
    /// Returns the output of the last step that ran, or `input` if every
    /// step was skipped.
    pub async fn run(
        &self,
        pipeline: &[BrickConfig],
        input: Value,
        options: RunOptions,
    ) -> Result<Value, BrickError> {
        let run_id = options.run_id();
        let mut state = RunState::new(run_id);
        state.start();

        info!(
            run_id = %run_id,
            steps = pipeline.len(),
            api_version = %options.api_version,
            "Starting pipeline run"
        );
        options.emit(ExecutionEvent::RunStarted {
            run_id,
            label: options.logger.label().map(str::to_string),
        });

        let context = self.initial_context(input.clone(), &options);
        let span = options.logger.run_span();
        let result = self
            .run_scope(pipeline, context, input, options.clone(), None)
            .instrument(span)
            .await;

        match &result {
            Ok(_) => {
                state.complete();
                info!(run_id = %run_id, "Pipeline run completed");
            }
            Err(err) => {
                match err.kind() {
                    ErrorKind::Cancel => state.cancel(),
                    _ => state.fail(),
                }
                log_run_error(&run_id.to_string(), err);
            }
        }

        options.emit(ExecutionEvent::RunCompleted { run_id, state });
        result
    }

    fn initial_context(&self, input: Value, options: &RunOptions) -> ExecutionContext {
        ExecutionContext::new()
            .with_binding(INPUT_KEY, input)
            .with_binding(OPTIONS_KEY, options.mod_options.clone())
            .with_bindings(options.integrations.context_bindings())
    }

    /// Run the steps of one scope in order.
    ///
    /// `initial` is the scope's value if no step runs. `branch` names the
    /// branch of the enclosing brick this scope belongs to.
    pub fn run_scope<'s>(
        &'s self,
        pipeline: &'s [BrickConfig],
        context: ExecutionContext,
        initial: Value,
        options: RunOptions,
        branch: Option<Branch>,
    ) -> BoxFuture<'s, Result<Value, BrickError>> {
        Box::pin(async move {
            let mut context = context;
            let mut last = initial;
            let mut bound: HashSet<&OutputKey> = HashSet::new();

            for (step_index, config) in pipeline.iter().enumerate() {
                let frame = StepFrame {
                    brick_id: config.id.clone(),
                    step_index,
                    instance_id: config.instance_id,
                    branch: branch.clone(),
                };

                options.abort_signal.check()?;

                if let Some(key) = &config.output_key {
                    if !key.is_valid() {
                        return Err(BrickError::business(format!("invalid output key '{}'", key)).in_step(frame));
                    }
                    if bound.contains(key) {
                        return Err(BrickError::business(format!(
                            "output key '{}' is already bound in this scope",
                            key
                        ))
                        .in_step(frame));
                    }
                }

                if let Some(mod_variables) = &options.mod_variables {
                    let snapshot = mod_variables.snapshot().await;
                    context = context.with_binding(MOD_KEY, Value::Object(snapshot));
                }

                let path = options.step_path(&frame);
                let span = options.logger.step_span(&frame, &path);
                let outcome = self
                    .run_step(config, &context, &frame, &path, &options)
                    .instrument(span)
                    .await;

                match outcome {
                    Ok(StepOutcome::Skipped) => {}
                    Ok(StepOutcome::Completed(output)) => {
                        if let Some(key) = &config.output_key {
                            context = context.with_binding(key.binding(), output.clone());
                            bound.insert(key);
                        }
                        last = output;
                    }
                    Err(err) => return Err(err.in_step(frame)),
                }
            }

            Ok(last)
        })
    }

    async fn run_step(
        &self,
        config: &BrickConfig,
        context: &ExecutionContext,
        frame: &StepFrame,
        path: &str,
        options: &RunOptions,
    ) -> Result<StepOutcome, BrickError> {
        let pending = StepState::Pending;
        if let Some(condition) = &config.condition {
            let value = match self.resolver.resolve_value(condition, context, options.api_version) {
                Ok(value) => value,
                Err(err) => {
                    let err = BrickError::from(err);
                    self.emit_state(options, frame, path, pending.fail(err.kind(), err.to_string()));
                    return Err(err);
                }
            };
            if !is_truthy(&value) {
                debug!("Skipping step, condition is falsy");
                self.emit_state(
                    options,
                    frame,
                    path,
                    StepState::Skipped {
                        reason: "condition is falsy".to_string(),
                    },
                );
                return Ok(StepOutcome::Skipped);
            }
        }

        let running = pending.start();
        self.emit_state(options, frame, path, running.clone());
        debug!("Running step");

        match self.invoke(config, context, frame, options).await {
            Ok(output) => {
                debug!("Step completed");
                self.emit_state(options, frame, path, running.complete(output.clone()));
                Ok(StepOutcome::Completed(output))
            }
            Err(err) => {
                self.emit_state(options, frame, path, running.fail(err.kind(), err.root().to_string()));
                Err(err)
            }
        }
    }

    async fn invoke(
        &self,
        config: &BrickConfig,
        context: &ExecutionContext,
        frame: &StepFrame,
        options: &RunOptions,
    ) -> Result<Value, BrickError> {
        let args = self
            .resolver
            .resolve_config(&config.config, context, options.api_version)?;
        let brick = self.registry.lookup(&config.id)?;

        if options.validate_input {
            let errors = brick.input_schema().validate(&args);
            if !errors.is_empty() {
                return Err(BrickError::Validation {
                    brick_id: config.id.clone(),
                    errors,
                });
            }
        }

        let brick_options = BrickOptions::new(self, context, options, frame);
        options
            .abort_signal
            .race(brick.run(BrickArgs::new(args), brick_options))
            .await
    }

    fn emit_state(&self, options: &RunOptions, frame: &StepFrame, path: &str, state: StepState) {
        options.emit(ExecutionEvent::StepStateChanged {
            run_id: options.run_id(),
            path: path.to_string(),
            frame: frame.clone(),
            depth: options.depth(),
            state,
        });
    }
}

fn log_run_error(run_id: &str, err: &BrickError) {
    let path = err.path_string();
    match err.kind() {
        ErrorKind::Cancel => info!(run_id, "Pipeline run cancelled: {}", err),
        ErrorKind::Application => error!(run_id, path = %path, "Pipeline run failed: {}", err),
        ErrorKind::Business | ErrorKind::Validation => {
            warn!(run_id, path = %path, kind = %err.kind(), "Pipeline run failed: {}", err.root())
        }
    }
}
