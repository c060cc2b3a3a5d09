//! Sequential workflow engine for Conduit.
//!
//! A workflow is an ordered list of nodes. Each node names an action (an
//! executable next to the orchestrator) and carries an input document that
//! may reference the run's initial data and the outputs of earlier nodes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  PipelineEngine                                              │
//! │   WorkflowDefinition ──▶ WorkflowRunner (one node at a time) │
//! │                            │                                 │
//! │            TemplateResolver │ serialize → template → parse   │
//! │                            ▼                                 │
//! │            ActionExecutor   stdin ▶ action process ▶ stdout  │
//! │                            │                                 │
//! │            ExecutionContext ◀ append node output             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same [`Format`] (JSON, or YAML with the `yaml` feature) is used for the
//! workflow file, node inputs and outputs, and the initial data.

pub mod context;
pub mod definition;
pub mod engine;
pub mod error;
pub mod executor;
pub mod format;
pub mod protocol;
pub mod runner;
pub mod template;
pub mod validate;

pub use context::{ExecutionContext, NodeResult};
pub use definition::{NodeDefinition, WorkflowDefinition, parse_initial_data};
pub use engine::{PipelineConfig, PipelineEngine};
pub use error::{
    ActionExecutionError, NodeError, NodeFailure, ParseError, PipelineError, ResolutionError,
    Result, WorkflowError,
};
pub use executor::{
    ActionExecutor, ActionHandler, ActionLocator, DEFAULT_PROGRAM_NAME, ProcessExecutor,
    RegistryExecutor,
};
pub use format::Format;
pub use protocol::{ActionExit, ERROR_KEY};
pub use runner::{RunState, WorkflowRunner};
pub use template::{Template, TemplateResolver};
pub use validate::{ValidationReport, Violation, validate_document, validate_text};
