//! Declarative workflow definition parser.
//!
//! Parses workflow documents in the build's interchange format into
//! `WorkflowDefinition` structs.
//!
//! # Example (JSON)
//!
//! ```json
//! {
//!   "name": "greet",
//!   "description": "Echo a greeting and write it to disk",
//!   "workflow_data_schema": { "user": "string" },
//!   "nodes": [
//!     {
//!       "id": "hello",
//!       "type": "echo",
//!       "inputs_from_workflow": { "message": "{{.workflow_data.user}}", "prefix": "Hi " }
//!     },
//!     {
//!       "id": "save",
//!       "type": "write-file",
//!       "inputs_from_workflow": {
//!         "path": "/tmp/greeting.txt",
//!         "content": "{{.nodes.hello.output.echoed_message}}",
//!         "mode": "overwrite"
//!       }
//!     }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ParseError, WorkflowError};
use crate::format::Format;

/// A complete declarative workflow definition.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkflowDefinition {
    /// Workflow name.
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Advisory type labels for the initial data. Never enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_data_schema: Option<BTreeMap<String, String>>,

    /// Nodes, executed in this order.
    pub nodes: Vec<NodeDefinition>,
}

/// A single step within a workflow.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NodeDefinition {
    /// Unique node identifier within this workflow.
    pub id: String,

    /// Action type; names the executable that implements the node.
    #[serde(rename = "type")]
    pub node_type: String,

    /// Raw input. May contain template expressions at any scalar position.
    #[serde(default = "empty_mapping")]
    pub inputs_from_workflow: Value,
}

fn empty_mapping() -> Value {
    Value::Object(Default::default())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl WorkflowDefinition {
    /// Parse a workflow definition from text in the given format.
    pub fn parse(text: &str, format: Format) -> Result<Self, ParseError> {
        let workflow: Self = format
            .parse_as(text)
            .map_err(|message| ParseError::Malformed {
                what: "workflow",
                format: format.name(),
                message,
            })?;
        debug!(
            workflow = %workflow.name,
            nodes = workflow.nodes.len(),
            "Parsed workflow definition"
        );
        Ok(workflow)
    }

    /// Load a workflow definition from a file path.
    pub fn from_file(path: &Path, format: Format) -> Result<Self, ParseError> {
        let content = std::fs::read_to_string(path).map_err(|source| ParseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, format)
    }

    /// Check the invariants the runner relies on.
    ///
    /// Checks:
    /// - At least one node
    /// - No empty node IDs
    /// - No duplicate node IDs
    ///
    /// The full structural report for a raw document lives in
    /// [`crate::validate`]; this is the runner's own re-check.
    pub fn check_runnable(&self) -> Result<(), WorkflowError> {
        if self.nodes.is_empty() {
            return Err(WorkflowError::InvalidWorkflow(
                "Workflow must have at least one node".into(),
            ));
        }

        let mut seen_ids = HashSet::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if node.id.trim().is_empty() {
                return Err(WorkflowError::InvalidWorkflow(format!(
                    "Node {} has empty ID",
                    index
                )));
            }
            if !seen_ids.insert(node.id.as_str()) {
                return Err(WorkflowError::InvalidWorkflow(format!(
                    "Duplicate node ID: {}",
                    node.id
                )));
            }
        }

        Ok(())
    }
}

/// Parse the caller-supplied initial data document.
///
/// `None` yields an empty mapping, matching a run started without data.
pub fn parse_initial_data(text: Option<&str>, format: Format) -> Result<Value, ParseError> {
    match text {
        None => Ok(empty_mapping()),
        Some(text) => format.parse(text).map_err(|message| ParseError::Malformed {
            what: "initial data",
            format: format.name(),
            message,
        }),
    }
}
