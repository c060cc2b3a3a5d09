//! Validate command - structural checks without running anything.

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use console::style;

use conduit_pipeline::{Format, validate_text};

use super::Context;

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Workflow definition file
    pub workflow: PathBuf,
}

/// Run the validate command.
///
/// Every violation is listed on stderr before the command fails.
pub fn run(args: ValidateArgs, ctx: &Context) -> Result<()> {
    let format = Format::build_default();
    let text = std::fs::read_to_string(&args.workflow).with_context(|| {
        format!("failed to read workflow file {}", args.workflow.display())
    })?;

    let report = validate_text(&text, format)
        .with_context(|| format!("invalid {format} syntax in {}", args.workflow.display()))?;

    if !report.is_valid() {
        eprintln!("{} Workflow validation failed:", style("[FAILED]").red().bold());
        for violation in &report.violations {
            eprintln!("  - {violation}");
        }
        bail!(
            "{} validation error(s) in {}",
            report.violations.len(),
            args.workflow.display()
        );
    }

    if ctx.verbose {
        eprintln!("{} Checked as {format}", style("[INFO]").cyan());
    }
    println!(
        "{} Workflow file '{}' is valid",
        style("[OK]").green().bold(),
        args.workflow.display()
    );
    Ok(())
}
