//! Run options - everything a run carries down the recursion

use crate::execution::errors::{BrickError, StepFrame};
use crate::execution::events::{EventHandler, ExecutionEvent};
use crate::integration::IntegrationContext;
use crate::resolver::ApiVersion;
use crate::variables::ModVariableHandle;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info_span, Span};
use uuid::Uuid;

#[derive(Default)]
struct AbortState {
    aborted: AtomicBool,
    reason: OnceLock<String>,
    notify: Notify,
}

/// Cooperative cancellation shared by everything in a run
#[derive(Clone, Default)]
pub struct AbortSignal {
    state: Arc<AbortState>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Only the first reason is kept.
    pub fn abort(&self, reason: impl Into<String>) {
        let _ = self.state.reason.set(reason.into());
        self.state.aborted.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<&str> {
        self.state.reason.get().map(String::as_str)
    }

    fn cancel_error(&self) -> BrickError {
        BrickError::cancelled(self.reason().unwrap_or("aborted"))
    }

    /// Fail with `Cancelled` if the signal has fired
    pub fn check(&self) -> Result<(), BrickError> {
        if self.is_aborted() {
            return Err(self.cancel_error());
        }
        Ok(())
    }

    /// Resolves once the signal fires
    pub async fn aborted(&self) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    /// Run `operation` unless the signal fires first
    pub async fn race<T, F>(&self, operation: F) -> Result<T, BrickError>
    where
        F: Future<Output = Result<T, BrickError>>,
    {
        tokio::select! {
            biased;
            _ = self.aborted() => Err(self.cancel_error()),
            result = operation => result,
        }
    }

    /// Race `operation` against a timer and the signal
    pub async fn race_timeout<T, F>(&self, operation: F, timeout: Duration) -> Result<T, BrickError>
    where
        F: Future<Output = Result<T, BrickError>>,
    {
        self.race(async {
            tokio::time::timeout(timeout, operation)
                .await
                .map_err(|_| BrickError::Timeout(timeout))?
        })
        .await
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .field("reason", &self.reason())
            .finish()
    }
}

/// Tracing spans for a run and its steps
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: Uuid,
    label: Option<String>,
}

impl Default for RunLogger {
    fn default() -> Self {
        Self::new(Uuid::new_v4())
    }
}

impl RunLogger {
    pub fn new(run_id: Uuid) -> Self {
        Self { run_id, label: None }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn run_span(&self) -> Span {
        info_span!("run", run_id = %self.run_id, label = self.label.as_deref().unwrap_or(""))
    }

    pub fn step_span(&self, frame: &StepFrame, path: &str) -> Span {
        info_span!(
            "step",
            run_id = %self.run_id,
            brick_id = %frame.brick_id,
            step_index = frame.step_index,
            path = %path
        )
    }
}

/// Options for one run, passed by value into every nested scope
#[derive(Clone)]
pub struct RunOptions {
    pub api_version: ApiVersion,
    pub abort_signal: AbortSignal,
    pub logger: RunLogger,
    pub integrations: Arc<IntegrationContext>,
    /// Bound as `@options`
    pub mod_options: Value,
    /// Snapshot bound as `@mod` before each step
    pub mod_variables: Option<ModVariableHandle>,
    pub event_handler: Option<EventHandler>,
    /// Check resolved arguments against each brick's input schema
    pub validate_input: bool,
    // Frames of the enclosing steps, outermost first
    ancestors: Arc<Vec<String>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            api_version: ApiVersion::default(),
            abort_signal: AbortSignal::new(),
            logger: RunLogger::default(),
            integrations: Arc::new(IntegrationContext::new()),
            mod_options: Value::Object(Default::default()),
            mod_variables: None,
            event_handler: None,
            validate_input: true,
            ancestors: Arc::new(Vec::new()),
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_version(mut self, api_version: ApiVersion) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn with_abort_signal(mut self, abort_signal: AbortSignal) -> Self {
        self.abort_signal = abort_signal;
        self
    }

    pub fn with_logger(mut self, logger: RunLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_integrations(mut self, integrations: IntegrationContext) -> Self {
        self.integrations = Arc::new(integrations);
        self
    }

    pub fn with_mod_options(mut self, mod_options: Value) -> Self {
        self.mod_options = mod_options;
        self
    }

    pub fn with_mod_variables(mut self, mod_variables: ModVariableHandle) -> Self {
        self.mod_variables = Some(mod_variables);
        self
    }

    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_validate_input(mut self, validate_input: bool) -> Self {
        self.validate_input = validate_input;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.logger.run_id()
    }

    /// Options for a scope nested inside the step at `frame`
    pub fn descend(&self, frame: &StepFrame) -> Self {
        let mut ancestors = self.ancestors.as_ref().clone();
        ancestors.push(frame.to_string());
        Self {
            ancestors: Arc::new(ancestors),
            ..self.clone()
        }
    }

    /// Nesting depth; 0 for the top-level pipeline
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    /// Full path of a step in this scope, in the same shape as
    /// [`BrickError::path_string`]
    pub fn step_path(&self, frame: &StepFrame) -> String {
        self.ancestors
            .iter()
            .cloned()
            .chain(std::iter::once(frame.to_string()))
            .collect::<Vec<_>>()
            .join(" > ")
    }

    pub fn emit(&self, event: ExecutionEvent) {
        if let Some(handler) = &self.event_handler {
            handler(event);
        }
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("api_version", &self.api_version)
            .field("abort_signal", &self.abort_signal)
            .field("logger", &self.logger)
            .field("integrations", &self.integrations.len())
            .field("mod_variables", &self.mod_variables)
            .field("validate_input", &self.validate_input)
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}
