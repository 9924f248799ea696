use anyhow::{Context, Result};
use brickwork::bricks::builtin;
use brickwork::cli::commands::{BricksCommand, NormalizeCommand, RunCommand, ValidateCommand};
use brickwork::cli::output::*;
use brickwork::cli::{Cli, Command};
use brickwork::core::brick_config::{normalize_pipeline, omit_editor_metadata};
use brickwork::core::config::{PipelineDefinition, RuntimeConfig};
use brickwork::execution::options::RunLogger;
use brickwork::variables::ModVariableHandle;
use brickwork::{
    AbortSignal, Brick, BuiltinTemplateEngine, ErrorKind, ExpressionResolver, InMemoryBrickRegistry,
    InMemoryModVariableStore, IntegrationContextBuilder, Namespace, Reducer, RunOptions,
    StaticIntegrationResolver,
};
use serde_json::{json, Map, Value};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

/// Exit code for a run stopped by its abort signal (128 + SIGINT)
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::from_args();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await,
        Command::Validate(cmd) => validate_pipeline(cmd),
        Command::Normalize(cmd) => normalize(cmd),
        Command::Bricks(cmd) => list_bricks(cmd),
    }
}

async fn run_pipeline(cmd: &RunCommand) -> Result<ExitCode> {
    let runtime = match &cmd.config {
        Some(path) => RuntimeConfig::from_file(path).context("Failed to load runtime config")?,
        None => RuntimeConfig::default(),
    };

    let engine = if cmd.strict_templates || runtime.strict_templates {
        BuiltinTemplateEngine::strict()
    } else {
        BuiltinTemplateEngine::new()
    };
    let resolver = ExpressionResolver::new(Arc::new(engine));

    let definition = PipelineDefinition::from_file(&cmd.file).context("Failed to load pipeline")?;
    definition.validate(&resolver)?;

    if !cmd.quiet {
        println!("{} Loaded pipeline: {}", INFO, style(&definition.name).bold());
    }

    let reducer = Reducer::new(Arc::new(InMemoryBrickRegistry::with_builtins()), resolver);
    for id in reducer.unknown_bricks(&definition.pipeline) {
        println!("{} Unknown brick: {}", WARN, style(&id).yellow());
    }

    let input = build_input(cmd, &definition);
    let integrations = StaticIntegrationResolver::new(runtime.integrations.clone())
        .build(&definition.integrations)
        .await
        .context("Failed to resolve integrations")?;

    let mod_id = runtime.mod_id.clone().unwrap_or_else(|| definition.name.clone());
    let store = Arc::new(InMemoryModVariableStore::new());
    let mod_variables = ModVariableHandle::new(store, Namespace::new(mod_id));

    // Ctrl-C fires the abort signal; the reducer winds down on its own
    let abort_signal = AbortSignal::new();
    let signal = abort_signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Received interrupt");
            signal.abort("interrupted by user");
        }
    });

    let spinner = (!cmd.quiet).then(|| create_spinner(format!("Running {}", definition.name)));
    let mut options = RunOptions::new()
        .with_api_version(definition.api_version.unwrap_or(runtime.api_version))
        .with_abort_signal(abort_signal.clone())
        .with_logger(RunLogger::new(Uuid::new_v4()).with_label(definition.name.clone()))
        .with_integrations(integrations)
        .with_mod_options(Value::Object(runtime.mod_options.clone()))
        .with_mod_variables(mod_variables)
        .with_validate_input(runtime.validate_input);

    if let Some(progress) = spinner.clone() {
        options = options.with_event_handler(move |event| {
            progress.println(format_execution_event(&event));
        });
    }

    let run = reducer.run(&definition.pipeline, input, options);
    let result = match cmd.timeout_secs {
        Some(secs) => abort_signal.race_timeout(run, Duration::from_secs(secs)).await,
        None => run.await,
    };

    if let Some(progress) = &spinner {
        progress.finish_and_clear();
    }

    match result {
        Ok(output) => {
            if cmd.quiet {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!(
                    "\n{} {} completed {}",
                    CHECK,
                    style(&definition.name).bold(),
                    style("successfully").green()
                );
                println!("{}", format_output(&output, 40));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) if err.kind() == ErrorKind::Cancel => {
            println!(
                "\n{} {} {}",
                WARN,
                style(&definition.name).bold(),
                style("cancelled").yellow()
            );
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        Err(err) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&definition.name).bold(),
                style("failed").red()
            );
            println!("{}", format_run_error(&err));
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Input from `--input`, else the file's `inputs`, with `--set` applied on top
fn build_input(cmd: &RunCommand, definition: &PipelineDefinition) -> Value {
    let mut input = cmd
        .input
        .clone()
        .or_else(|| definition.inputs.clone())
        .unwrap_or_else(|| Value::Object(Map::new()));

    if cmd.set.is_empty() {
        return input;
    }

    let Value::Object(fields) = &mut input else {
        warn!("Ignoring --set overrides: input is not an object");
        return input;
    };
    for (key, value) in &cmd.set {
        if !cmd.quiet {
            println!("{} Input override: {} = {}", INFO, style(key).cyan(), style(value).dim());
        }
        fields.insert(key.clone(), Value::String(value.clone()));
    }
    input
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<ExitCode> {
    if !cmd.json {
        println!("{} Validating pipeline...", INFO);
    }

    let definition = match PipelineDefinition::from_file(&cmd.file) {
        Ok(definition) => definition,
        Err(e) => {
            if cmd.json {
                let report = json!({ "valid": false, "error": format!("{:#}", e) });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{} Validation failed:", CROSS);
                println!("  {}", style(format!("{:#}", e)).red());
            }
            return Ok(ExitCode::FAILURE);
        }
    };

    let unknown = Reducer::with_builtins().unknown_bricks(&definition.pipeline);

    if cmd.json {
        let report = json!({
            "valid": unknown.is_empty(),
            "name": definition.name,
            "steps": definition.pipeline.len(),
            "integrations": definition.integrations.len(),
            "unknownBricks": unknown,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} Pipeline definition is valid!", CHECK);
        println!("  Name: {}", style(&definition.name).bold());
        println!("  Steps: {}", style(definition.pipeline.len()).cyan());
        println!("  Integrations: {}", style(definition.integrations.len()).cyan());
        for id in &unknown {
            println!("{} Unknown brick: {}", WARN, style(id).yellow());
        }
    }

    if unknown.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn normalize(cmd: &NormalizeCommand) -> Result<ExitCode> {
    let mut definition = PipelineDefinition::from_file(&cmd.file).context("Failed to load pipeline")?;
    definition.pipeline = if cmd.strip {
        omit_editor_metadata(&definition.pipeline)
    } else {
        normalize_pipeline(&definition.pipeline)
    };

    let rendered = if cmd.json {
        serde_json::to_string_pretty(&definition)?
    } else {
        serde_yaml::to_string(&definition)?
    };
    println!("{}", rendered);
    Ok(ExitCode::SUCCESS)
}

fn list_bricks(cmd: &BricksCommand) -> Result<ExitCode> {
    let mut bricks = builtin::all();
    bricks.sort_by_key(|brick| brick.id());
    debug!(count = bricks.len(), "Listing registered bricks");

    if cmd.json {
        let data: Vec<Value> = bricks
            .iter()
            .map(|brick| {
                json!({
                    "id": brick.id(),
                    "name": brick.name(),
                    "description": brick.description(),
                    "inputSchema": brick.input_schema().to_json_schema(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json!({ "bricks": data }))?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} Registered bricks:", INFO);
    for brick in &bricks {
        println!(
            "  {} {}",
            style(brick.id()).cyan(),
            style(brick.description()).dim()
        );
    }
    Ok(ExitCode::SUCCESS)
}
