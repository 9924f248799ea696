//! Execution events - the trace of a run, as seen by callers

use crate::core::state::{RunState, StepState};
use crate::execution::errors::StepFrame;
use std::sync::Arc;
use uuid::Uuid;

/// Events that can occur during a pipeline run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        label: Option<String>,
    },
    StepStateChanged {
        run_id: Uuid,
        /// Full step path, e.g. `@brick/for-each#0 > body[1] > @brick/echo#0`
        path: String,
        frame: StepFrame,
        /// 0 for top-level steps
        depth: usize,
        state: StepState,
    },
    RunCompleted {
        run_id: Uuid,
        state: RunState,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;
