//! Pipeline execution

pub mod errors;
pub mod events;
pub mod options;
pub mod reducer;

pub use errors::{Branch, BrickError, ErrorKind, StepFrame};
pub use events::{EventHandler, ExecutionEvent};
pub use options::{AbortSignal, RunLogger, RunOptions};
pub use reducer::Reducer;
