//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{BricksCommand, NormalizeCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Runtime for declarative brick pipelines
#[derive(Debug, Parser, Clone)]
#[command(name = "brickwork")]
#[command(version)]
#[command(about = "Run, validate and normalize brick pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline
    Run(RunCommand),

    /// Validate a pipeline definition
    Validate(ValidateCommand),

    /// Assign instance ids to every brick (or strip them)
    Normalize(NormalizeCommand),

    /// List registered bricks
    Bricks(BricksCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
