//! Sequential workflow runner.
//!
//! ```text
//! Idle ──run()──▶ Running ──all nodes ok──▶ Completed
//!                    │
//!                    └──any failure──▶ Failed
//! ```
//!
//! Nodes run one at a time in definition order. Each node's input is resolved
//! against the results of the nodes before it, then handed to the executor.
//! The first failure ends the run; later nodes are never invoked and nothing
//! already done is undone.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use crate::context::ExecutionContext;
use crate::definition::{NodeDefinition, WorkflowDefinition};
use crate::error::{NodeFailure, WorkflowError};
use crate::executor::ActionExecutor;
use crate::template::TemplateResolver;

/// Lifecycle state of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Drives a single workflow run.
pub struct WorkflowRunner {
    resolver: TemplateResolver,
    executor: Arc<dyn ActionExecutor>,
    state: RunState,
}

impl WorkflowRunner {
    pub fn new(resolver: TemplateResolver, executor: Arc<dyn ActionExecutor>) -> Self {
        Self {
            resolver,
            executor,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run every node of `workflow` in order, seeding the context with
    /// `workflow_data`.
    ///
    /// Returns the final context on success. On failure the error carries the
    /// failing node's id and the context as it stood before that node.
    pub async fn run(
        &mut self,
        workflow: &WorkflowDefinition,
        workflow_data: Value,
    ) -> Result<ExecutionContext, WorkflowError> {
        if self.state != RunState::Idle {
            return Err(WorkflowError::AlreadyStarted(self.state));
        }

        if let Err(e) = workflow.check_runnable() {
            self.state = RunState::Failed;
            return Err(e);
        }

        self.state = RunState::Running;
        info!(
            workflow = %workflow.name,
            description = %workflow.description,
            nodes = workflow.nodes.len(),
            "Starting workflow execution"
        );

        let mut context = ExecutionContext::new(workflow_data);

        for node in &workflow.nodes {
            info!(node_id = %node.id, node_type = %node.node_type, "Executing node");

            match self.run_node(node, &context).await {
                Ok(output) => {
                    context.record(&node.id, output);
                    info!(node_id = %node.id, "Node completed successfully");
                }
                Err(failure) => {
                    error!(node_id = %node.id, error = %failure, "Node execution failed");
                    self.state = RunState::Failed;
                    return Err(WorkflowError::NodeFailed {
                        node_id: node.id.clone(),
                        node_type: node.node_type.clone(),
                        source: failure,
                        context: Box::new(context),
                    });
                }
            }
        }

        self.state = RunState::Completed;
        info!(
            workflow = %workflow.name,
            nodes = context.nodes().len(),
            "Workflow completed successfully"
        );
        Ok(context)
    }

    async fn run_node(
        &self,
        node: &NodeDefinition,
        context: &ExecutionContext,
    ) -> Result<Value, NodeFailure> {
        let input = self.resolver.resolve(&node.inputs_from_workflow, context)?;
        let output = self.executor.execute(&node.node_type, &input).await?;
        Ok(output)
    }
}

impl fmt::Debug for WorkflowRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRunner")
            .field("format", &self.resolver.format())
            .field("state", &self.state)
            .finish()
    }
}
