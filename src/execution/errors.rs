//! Error taxonomy for pipeline runs
//!
//! Every error has a [`ErrorKind`] that decides how it is logged, shown to
//! the user and reported. Errors that cross a step boundary are wrapped in
//! [`BrickError::Step`], so the chain of frames forms the error's path.

use crate::core::brick_config::BrickId;
use crate::integration::IntegrationError;
use crate::resolver::RenderError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Message shown to users for application defects
pub const GENERIC_USER_MESSAGE: &str = "An unexpected error occurred";

/// Classification of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Expected failure: bad data, failed request, rejected input
    Business,
    /// Defect in the runtime or a brick
    Application,
    /// The run was aborted; not a failure
    Cancel,
    /// Brick input did not match its schema
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Business => f.write_str("business"),
            ErrorKind::Application => f.write_str("application"),
            ErrorKind::Cancel => f.write_str("cancel"),
            ErrorKind::Validation => f.write_str("validation"),
        }
    }
}

/// A named sub-pipeline of a control-flow brick, e.g. `body[3]` or `else`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub key: String,
    pub counter: Option<usize>,
}

impl Branch {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            counter: None,
        }
    }

    pub fn indexed(key: impl Into<String>, counter: usize) -> Self {
        Self {
            key: key.into(),
            counter: Some(counter),
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.counter {
            Some(counter) => write!(f, "{}[{}]", self.key, counter),
            None => f.write_str(&self.key),
        }
    }
}

/// Where a step sits: which brick, its index in its scope, and the branch
/// of the enclosing brick that scope belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFrame {
    pub brick_id: BrickId,
    pub step_index: usize,
    pub instance_id: Option<Uuid>,
    pub branch: Option<Branch>,
}

impl fmt::Display for StepFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(branch) = &self.branch {
            write!(f, "{} > ", branch)?;
        }
        write!(f, "{}#{}", self.brick_id, self.step_index)
    }
}

/// Errors raised while running a pipeline
#[derive(Debug, Error)]
pub enum BrickError {
    #[error("{0}")]
    Business(String),

    #[error("{0}")]
    Application(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    #[error("run cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("invalid input for {brick_id}: {}", .errors.join("; "))]
    Validation { brick_id: BrickId, errors: Vec<String> },

    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("brick not found: {0}")]
    NotFound(BrickId),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{frame}: {source}")]
    Step {
        frame: StepFrame,
        source: Box<BrickError>,
    },
}

impl BrickError {
    pub fn business(message: impl Into<String>) -> Self {
        BrickError::Business(message.into())
    }

    pub fn application(message: impl Into<String>) -> Self {
        BrickError::Application(message.into())
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        BrickError::Cancelled { reason: reason.into() }
    }

    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        BrickError::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Annotate the error with the step it crossed. Cancellations unwind
    /// unannotated.
    pub fn in_step(self, frame: StepFrame) -> Self {
        if self.is_cancel() {
            return self;
        }
        BrickError::Step {
            frame,
            source: Box::new(self),
        }
    }

    /// The innermost error, beneath all step frames
    pub fn root(&self) -> &BrickError {
        let mut current = self;
        while let BrickError::Step { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BrickError::Business(_)
            | BrickError::Render(_)
            | BrickError::Integration(_)
            | BrickError::Timeout(_) => ErrorKind::Business,
            BrickError::Application(_) | BrickError::Internal(_) | BrickError::NotFound(_) => {
                ErrorKind::Application
            }
            BrickError::Cancelled { .. } => ErrorKind::Cancel,
            BrickError::Validation { .. } | BrickError::InvalidArgument { .. } => ErrorKind::Validation,
            BrickError::Step { source, .. } => source.kind(),
        }
    }

    pub fn is_cancel(&self) -> bool {
        self.kind() == ErrorKind::Cancel
    }

    /// Error type name, as exposed to `try-except` handlers
    pub fn name(&self) -> &'static str {
        match self {
            BrickError::Business(_) => "BusinessError",
            BrickError::Application(_) | BrickError::Internal(_) => "ApplicationError",
            BrickError::Cancelled { .. } => "CancelError",
            BrickError::Validation { .. } => "InputValidationError",
            BrickError::InvalidArgument { .. } => "PropError",
            BrickError::NotFound(_) => "BrickNotFoundError",
            BrickError::Render(_) => "RenderError",
            BrickError::Integration(_) => "IntegrationError",
            BrickError::Timeout(_) => "TimeoutError",
            BrickError::Step { source, .. } => source.name(),
        }
    }

    /// Step frames, outermost first
    pub fn path(&self) -> Vec<&StepFrame> {
        let mut frames = Vec::new();
        let mut current = self;
        while let BrickError::Step { frame, source } = current {
            frames.push(frame);
            current = source.as_ref();
        }
        frames
    }

    pub fn path_string(&self) -> String {
        self.path()
            .iter()
            .map(|frame| frame.to_string())
            .collect::<Vec<_>>()
            .join(" > ")
    }

    /// What to show the user. Cancellations show nothing and defects show a
    /// generic message.
    pub fn user_message(&self) -> Option<String> {
        match self.kind() {
            ErrorKind::Cancel => None,
            ErrorKind::Application => Some(GENERIC_USER_MESSAGE.to_string()),
            ErrorKind::Business | ErrorKind::Validation => Some(self.root().to_string()),
        }
    }

    /// Only application defects are worth reporting
    pub fn should_report(&self) -> bool {
        self.kind() == ErrorKind::Application
    }

    /// Serialized form bound for `try-except` handlers
    pub fn to_context_value(&self) -> Value {
        json!({
            "name": self.name(),
            "kind": self.kind(),
            "message": self.root().to_string(),
            "path": self.path().iter().map(|frame| frame.to_string()).collect::<Vec<_>>(),
        })
    }
}
