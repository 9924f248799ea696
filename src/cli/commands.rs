//! CLI command definitions

use clap::Args;
use serde_json::Value;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Pipeline input as JSON (defaults to the file's `inputs`)
    #[arg(long, value_parser = parse_json)]
    pub input: Option<Value>,

    /// Input field overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,

    /// Path to runtime configuration YAML
    #[arg(short, long)]
    pub config: Option<String>,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Fail on undefined template variables
    #[arg(long)]
    pub strict_templates: bool,

    /// Only print the final output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Validate a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Normalize a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct NormalizeCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Remove instance ids instead of assigning them
    #[arg(long)]
    pub strip: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List registered bricks
#[derive(Debug, Args, Clone)]
pub struct BricksCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

/// Parse a JSON argument
pub fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("Invalid JSON: {}", e))
}
