//! Run command - execute a workflow file node by node.

use std::path::PathBuf;

use anyhow::{Context as _, Result, anyhow};
use clap::Args;
use console::style;
use tracing::info;

use conduit_pipeline::{
    DEFAULT_PROGRAM_NAME, ExecutionContext, Format, PipelineConfig, PipelineEngine,
};

use super::Context;

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Workflow definition file
    pub workflow: PathBuf,

    /// Initial workflow data document, inline
    #[arg(conflicts_with = "data_file")]
    pub initial_data: Option<String>,

    /// Read the initial workflow data document from a file
    #[arg(long, value_name = "PATH")]
    pub data_file: Option<PathBuf>,

    /// Print the final execution context on stdout
    #[arg(long)]
    pub emit_context: bool,
}

/// Run the run command.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let engine_config = ctx.config.engine();
    let engine = PipelineEngine::new(PipelineConfig {
        format: Format::build_default(),
        actions_dir: engine_config.actions_dir,
        program_name: engine_config
            .program_name
            .unwrap_or_else(|| DEFAULT_PROGRAM_NAME.to_string()),
    })
    .context("failed to start workflow engine")?;

    let workflow = engine
        .load_workflow(&args.workflow)
        .context("failed to load workflow")?;

    let initial_data = match (args.initial_data, &args.data_file) {
        (Some(text), _) => Some(text),
        (None, Some(path)) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read data file {}", path.display()))?,
        ),
        (None, None) => None,
    };
    let workflow_data = engine
        .parse_initial_data(initial_data.as_deref())
        .context("invalid initial data")?;

    info!(workflow = %workflow.name, description = %workflow.description, "Loaded workflow");
    eprintln!(
        "{} Running workflow '{}' ({} nodes)",
        style("[INFO]").cyan(),
        workflow.name,
        workflow.nodes.len()
    );

    match engine.run(&workflow, workflow_data).await {
        Ok(context) => {
            if ctx.verbose {
                for node_id in context.completed() {
                    eprintln!("{} {}", style("[OK]").green(), node_id);
                }
            }
            eprintln!(
                "{} Workflow '{}' completed",
                style("[OK]").green().bold(),
                workflow.name
            );
            if args.emit_context {
                emit(&engine, &context)?;
            }
            Ok(())
        }
        Err(err) => {
            eprintln!(
                "{} Workflow '{}' failed",
                style("[FAILED]").red().bold(),
                workflow.name
            );
            if args.emit_context
                && let Some(partial) = err.partial_context()
            {
                emit(&engine, partial)?;
            }
            Err(anyhow::Error::new(err))
        }
    }
}

fn emit(engine: &PipelineEngine, context: &ExecutionContext) -> Result<()> {
    let text = engine
        .format()
        .to_pretty_text(context)
        .map_err(|e| anyhow!("failed to render execution context: {e}"))?;
    println!("{}", text.trim_end());
    Ok(())
}
