//! Error types for the pipeline engine.
//!
//! Every failure a run can hit falls into one of five kinds: the workflow or
//! initial data did not parse ([`ParseError`]), a node's templates did not
//! resolve ([`ResolutionError`]), or the action itself failed ([`NodeError`]:
//! execution, output parsing, or an `error` field in its output). The runner
//! wraps node-level failures in [`WorkflowError::NodeFailed`] together with the
//! id of the node that failed.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::context::ExecutionContext;
use crate::runner::RunState;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Top-level error for the convenience entry points in [`crate::engine`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Failed to initialize the pipeline engine.
    #[error("Engine initialization failed: {0}")]
    InitFailed(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// A workflow or initial-data document could not be read or parsed.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document could not be read from disk.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The document is not valid in the active interchange format, or does
    /// not have the expected shape. `message` carries the parser's location.
    #[error("failed to parse {what} as {format}: {message}")]
    Malformed {
        what: &'static str,
        format: &'static str,
        message: String,
    },
}

/// Template resolution failed for a node's input.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The raw input could not be serialized to the interchange format.
    #[error("failed to serialize input as {format}: {message}")]
    Serialize {
        format: &'static str,
        message: String,
    },

    /// The serialized input contains a malformed template action.
    #[error("template syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// A template referenced a path that does not exist in the context.
    #[error("undefined template reference '{expression}': {reason}")]
    Undefined { expression: String, reason: String },

    /// The evaluated text is not valid in the interchange format.
    #[error("failed to parse resolved input as {format}: {message}")]
    Reparse {
        format: &'static str,
        message: String,
        /// The evaluated template text, for diagnostics.
        text: String,
    },
}

/// The action process could not be run to a successful exit.
#[derive(Debug, Error)]
pub enum ActionExecutionError {
    #[error("failed to spawn action {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to communicate with action {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("action {} exited with {status}: {stderr}", .path.display())]
    NonZeroExit {
        path: PathBuf,
        status: String,
        stderr: String,
    },

    /// No in-process handler is registered for the node type.
    #[error("no handler registered for action type '{0}'")]
    UnknownAction(String),

    /// The node type cannot name a sibling executable.
    #[error("action type '{0}' is not a valid executable name")]
    InvalidActionType(String),
}

/// Failure of a single node's action.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    ActionExecution(#[from] ActionExecutionError),

    #[error("failed to parse action output as {format}: {message}")]
    OutputParse {
        format: &'static str,
        message: String,
    },

    /// The action's output carried a top-level `error` field.
    #[error("action returned error: {}", render_error_value(.error))]
    ActionReported { error: Value },
}

/// Why a node did not produce a result.
#[derive(Debug, Error)]
pub enum NodeFailure {
    #[error("failed to resolve templates: {0}")]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Errors reported by [`crate::runner::WorkflowRunner`].
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The definition violates a precondition of the runner.
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// `run` was called on a runner that has already left `Idle`.
    #[error("workflow run already started (state: {0})")]
    AlreadyStarted(RunState),

    /// A node failed; later nodes were not invoked.
    #[error("error executing node {node_id}: {source}")]
    NodeFailed {
        node_id: String,
        node_type: String,
        #[source]
        source: NodeFailure,
        /// Results of the nodes that completed before the failure.
        context: Box<ExecutionContext>,
    },
}

impl WorkflowError {
    /// The id of the failing node, if the error came from a node.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            WorkflowError::NodeFailed { node_id, .. } => Some(node_id),
            _ => None,
        }
    }

    /// Context accumulated before the failure, if the run got that far.
    pub fn partial_context(&self) -> Option<&ExecutionContext> {
        match self {
            WorkflowError::NodeFailed { context, .. } => Some(context),
            _ => None,
        }
    }
}

fn render_error_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
