//! Pipeline engine: the entry point callers use to run workflow files.
//!
//! Bundles the interchange format, the template resolver and an action
//! executor. Each call to [`PipelineEngine::run`] drives a fresh
//! [`WorkflowRunner`], so one engine can run many workflows back to back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::definition::{WorkflowDefinition, parse_initial_data};
use crate::error::{PipelineError, Result, WorkflowError};
use crate::executor::{ActionExecutor, ActionLocator, DEFAULT_PROGRAM_NAME, ProcessExecutor};
use crate::format::Format;
use crate::runner::WorkflowRunner;
use crate::template::TemplateResolver;

/// Configuration for the pipeline engine.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Interchange format for workflow files, node I/O and initial data.
    pub format: Format,

    /// Directory holding action executables. Defaults to the directory of the
    /// running binary.
    pub actions_dir: Option<PathBuf>,

    /// Substring of the running binary's file name that is replaced by the
    /// node type to form an action's file name.
    pub program_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            format: Format::build_default(),
            actions_dir: None,
            program_name: DEFAULT_PROGRAM_NAME.to_string(),
        }
    }
}

/// Runs workflows with a fixed format and executor.
pub struct PipelineEngine {
    format: Format,
    executor: Arc<dyn ActionExecutor>,
}

impl PipelineEngine {
    /// Create an engine that runs actions as sibling processes.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let mut locator = ActionLocator::from_current_exe(config.program_name.clone())
            .map_err(|e| {
                PipelineError::InitFailed(format!("cannot locate running executable: {e}"))
            })?;
        if let Some(dir) = config.actions_dir {
            locator = locator.with_dir(dir);
        }
        debug!(actions_dir = %locator.dir().display(), format = %config.format, "Pipeline engine ready");

        Ok(Self::with_executor(
            config.format,
            Arc::new(ProcessExecutor::new(locator, config.format)),
        ))
    }

    /// Create an engine around any executor (in-process registry, test doubles).
    pub fn with_executor(format: Format, executor: Arc<dyn ActionExecutor>) -> Self {
        Self { format, executor }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Load a workflow file in the engine's format.
    pub fn load_workflow(&self, path: &Path) -> Result<WorkflowDefinition> {
        Ok(WorkflowDefinition::from_file(path, self.format)?)
    }

    /// Parse an initial-data document in the engine's format.
    pub fn parse_initial_data(&self, text: Option<&str>) -> Result<Value> {
        Ok(parse_initial_data(text, self.format)?)
    }

    /// Run an already-parsed workflow.
    pub async fn run(
        &self,
        workflow: &WorkflowDefinition,
        workflow_data: Value,
    ) -> std::result::Result<ExecutionContext, WorkflowError> {
        let mut runner =
            WorkflowRunner::new(TemplateResolver::new(self.format), self.executor.clone());
        runner.run(workflow, workflow_data).await
    }

    /// Load, parse and run a workflow file in one call.
    pub async fn run_file(
        &self,
        path: &Path,
        initial_data: Option<&str>,
    ) -> Result<ExecutionContext> {
        let workflow = self.load_workflow(path)?;
        let data = self.parse_initial_data(initial_data)?;
        Ok(self.run(&workflow, data).await?)
    }
}

impl std::fmt::Debug for PipelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEngine")
            .field("format", &self.format)
            .finish()
    }
}
