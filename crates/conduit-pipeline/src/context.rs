//! Execution context: the run's initial data plus the outputs of the nodes
//! that have completed so far.
//!
//! The runner is the only writer. Results are appended once per successful
//! node and never replaced or removed; `workflow_data` is fixed at run start.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};

/// The output an action produced for one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeResult {
    pub output: Value,
}

/// Accumulated state of a single workflow run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionContext {
    workflow_data: Value,
    nodes: BTreeMap<String, NodeResult>,
    #[serde(skip)]
    order: Vec<String>,
}

impl ExecutionContext {
    /// Create a context seeded with the caller's initial data.
    pub fn new(workflow_data: Value) -> Self {
        Self {
            workflow_data,
            nodes: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    /// Initial data supplied at run start.
    pub fn workflow_data(&self) -> &Value {
        &self.workflow_data
    }

    /// Results keyed by node id.
    pub fn nodes(&self) -> &BTreeMap<String, NodeResult> {
        &self.nodes
    }

    /// Result for a single node, if it has completed.
    pub fn node(&self, id: &str) -> Option<&NodeResult> {
        self.nodes.get(id)
    }

    /// Completed node ids in the order they finished.
    pub fn completed(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Append a node's result.
    ///
    /// Returns `false` and leaves the context untouched when the node already
    /// has a result; results are never overwritten.
    pub(crate) fn record(&mut self, id: &str, output: Value) -> bool {
        if self.nodes.contains_key(id) {
            return false;
        }
        self.nodes.insert(id.to_string(), NodeResult { output });
        self.order.push(id.to_string());
        true
    }

    /// Build the value templates are evaluated against.
    ///
    /// Exposes two names: `workflow_data`, and `nodes` mapping each completed
    /// node id to `{output, error}`. `error` is always empty here because only
    /// successful nodes are ever recorded.
    pub fn template_environment(&self) -> Value {
        let nodes: Map<String, Value> = self
            .nodes
            .iter()
            .map(|(id, result)| {
                (
                    id.clone(),
                    json!({ "output": result.output, "error": "" }),
                )
            })
            .collect();

        json!({
            "workflow_data": self.workflow_data,
            "nodes": nodes,
        })
    }
}
