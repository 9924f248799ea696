//! Execution state models

use crate::execution::errors::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Run has not started
    Pending,
    /// Run is in progress
    Running,
    /// Run completed successfully
    Completed,
    /// Run failed
    Failed,
    /// Run was cancelled through the abort signal
    Cancelled,
}

/// State of a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepState {
    /// Step has not started
    Pending,
    /// Brick is running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Brick returned
    Completed {
        output: Value,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Condition resolved falsy
    Skipped {
        reason: String,
    },
    /// Step raised an error
    Failed {
        kind: ErrorKind,
        message: String,
        failed_at: DateTime<Utc>,
    },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Completed { .. } | StepState::Failed { .. } | StepState::Skipped { .. }
        )
    }

    /// Transition Pending -> Running
    pub fn start(&self) -> StepState {
        StepState::Running {
            started_at: Utc::now(),
        }
    }

    /// Transition Running -> Completed
    pub fn complete(&self, output: Value) -> StepState {
        let started_at = match self {
            StepState::Running { started_at } => *started_at,
            _ => Utc::now(),
        };
        StepState::Completed {
            output,
            started_at,
            completed_at: Utc::now(),
        }
    }

    /// Transition to Failed
    pub fn fail(&self, kind: ErrorKind, message: impl Into<String>) -> StepState {
        StepState::Failed {
            kind,
            message: message.into(),
            failed_at: Utc::now(),
        }
    }
}

/// State of one top-level run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current status
    pub status: ExecutionStatus,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run finished
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }

    /// Mark run as started
    pub fn start(&mut self) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark run as completed
    pub fn complete(&mut self) {
        self.finish(ExecutionStatus::Completed);
    }

    /// Mark run as failed
    pub fn fail(&mut self) {
        self.finish(ExecutionStatus::Failed);
    }

    /// Mark run as cancelled
    pub fn cancel(&mut self) {
        self.finish(ExecutionStatus::Cancelled);
    }

    fn finish(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Elapsed time, once finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.started_at?)
    }
}
