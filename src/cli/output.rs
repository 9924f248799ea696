//! CLI output formatting

use crate::core::state::{ExecutionStatus, StepState};
use crate::execution::{BrickError, ExecutionEvent};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a spinner shown while a run is in progress
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    let spinner_style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    progress.set_style(spinner_style);
    progress.set_message(message.into());
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    match state {
        StepState::Pending => style("PENDING").dim().to_string(),
        StepState::Running { .. } => style("RUNNING").yellow().to_string(),
        StepState::Completed {
            started_at,
            completed_at,
            ..
        } => {
            let millis = (*completed_at - *started_at).num_milliseconds();
            format!("{} {}", style("COMPLETED").green(), style(format!("({}ms)", millis)).dim())
        }
        StepState::Failed { kind, .. } => style(format!("FAILED ({})", kind)).red().to_string(),
        StepState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted { run_id, label } => format!(
            "{} Starting {} ({})",
            ROCKET,
            style(label.as_deref().unwrap_or("pipeline")).bold(),
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::StepStateChanged {
            frame, depth, state, ..
        } => {
            let indent = "  ".repeat(*depth);
            let icon = match state {
                StepState::Completed { .. } => CHECK,
                StepState::Failed { .. } => CROSS,
                StepState::Skipped { .. } => SKIP,
                StepState::Pending | StepState::Running { .. } => SPINNER,
            };
            let branch = frame
                .branch
                .as_ref()
                .map(|branch| format!("{} ", style(format!("[{}]", branch)).dim()))
                .unwrap_or_default();
            format!(
                "{}{}{}{} {}",
                indent,
                icon,
                branch,
                style(&frame.brick_id).cyan(),
                format_step_state(state)
            )
        }
        ExecutionEvent::RunCompleted { run_id, state } => {
            let elapsed = state
                .duration()
                .map(|d| format!(" in {}ms", d.num_milliseconds()))
                .unwrap_or_default();
            format!(
                "{} Run ({}) {}{}",
                INFO,
                style(&run_id.to_string()[..8]).dim(),
                format_status(state.status),
                elapsed
            )
        }
    }
}

/// Format a run error for the user. Application defects get the generic
/// message; the detail goes to the log.
pub fn format_run_error(err: &BrickError) -> String {
    let message = err.user_message().unwrap_or_else(|| err.to_string());
    let path = err.path_string();
    if path.is_empty() {
        format!("{} {}", CROSS, style(message).red())
    } else {
        format!("{} {}\n   {} {}", CROSS, style(message).red(), style("at").dim(), style(path).dim())
    }
}

/// Format a JSON output with truncation
pub fn format_output(output: &Value, max_lines: usize) -> String {
    let rendered = serde_json::to_string_pretty(output).unwrap_or_else(|_| output.to_string());
    let lines: Vec<&str> = rendered.lines().collect();

    if lines.len() <= max_lines {
        rendered
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}
