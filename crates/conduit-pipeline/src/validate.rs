//! Structural validation of a raw workflow document.
//!
//! Works on the untyped document so that every violation can be reported at
//! once, instead of stopping at the first field the typed parser trips over.
//! Nothing is executed.

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

use crate::error::ParseError;
use crate::format::Format;

const REQUIRED_FIELDS: [&str; 3] = ["name", "description", "nodes"];
const NODE_REQUIRED_FIELDS: [&str; 3] = ["id", "type", "inputs_from_workflow"];

/// A single structural problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    MissingField(&'static str),
    NotAMapping,
    NodesNotSequence,
    NodesEmpty,
    NodeNotMapping(usize),
    NodeMissingField { index: usize, field: &'static str },
    DuplicateNodeId(String),
    EmptyNodeId(usize),
    EmptyNodeType(usize),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingField(field) => write!(f, "Missing required field: {}", field),
            Violation::NotAMapping => write!(f, "Workflow document must be a mapping"),
            Violation::NodesNotSequence => write!(f, "Nodes must be an array"),
            Violation::NodesEmpty => write!(f, "Nodes array cannot be empty"),
            Violation::NodeNotMapping(i) => write!(f, "Node {} is not a valid object", i),
            Violation::NodeMissingField { index, field } => {
                write!(f, "Node {} missing required field: {}", index, field)
            }
            Violation::DuplicateNodeId(id) => write!(f, "Duplicate node ID: {}", id),
            Violation::EmptyNodeId(i) => write!(f, "Node {} has empty ID", i),
            Violation::EmptyNodeType(i) => write!(f, "Node {} has empty type", i),
        }
    }
}

/// All violations found in a document. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Parse `text` in the given format and check its structure.
///
/// Syntax errors are returned as `Err`; structural problems are collected in
/// the report.
pub fn validate_text(text: &str, format: Format) -> Result<ValidationReport, ParseError> {
    let document = format.parse(text).map_err(|message| ParseError::Malformed {
        what: "workflow",
        format: format.name(),
        message,
    })?;
    Ok(validate_document(&document))
}

/// Check the structure of an already-parsed workflow document.
pub fn validate_document(document: &Value) -> ValidationReport {
    let mut violations = Vec::new();

    let Some(workflow) = document.as_object() else {
        violations.push(Violation::NotAMapping);
        return ValidationReport { violations };
    };

    for field in REQUIRED_FIELDS {
        if !workflow.contains_key(field) {
            violations.push(Violation::MissingField(field));
        }
    }

    if let Some(nodes) = workflow.get("nodes") {
        match nodes.as_array() {
            Some(nodes) => check_nodes(nodes, &mut violations),
            None => violations.push(Violation::NodesNotSequence),
        }
    }

    ValidationReport { violations }
}

fn check_nodes(nodes: &[Value], violations: &mut Vec<Violation>) {
    if nodes.is_empty() {
        violations.push(Violation::NodesEmpty);
    }

    let mut seen_ids = HashSet::new();
    for (index, node) in nodes.iter().enumerate() {
        let Some(node) = node.as_object() else {
            violations.push(Violation::NodeNotMapping(index));
            continue;
        };

        for field in NODE_REQUIRED_FIELDS {
            if !node.contains_key(field) {
                violations.push(Violation::NodeMissingField { index, field });
            }
        }

        if let Some(id) = node.get("id").and_then(Value::as_str) {
            if !seen_ids.insert(id) {
                violations.push(Violation::DuplicateNodeId(id.to_string()));
            }
            if id.trim().is_empty() {
                violations.push(Violation::EmptyNodeId(index));
            }
        }

        if let Some(node_type) = node.get("type").and_then(Value::as_str)
            && node_type.trim().is_empty()
        {
            violations.push(Violation::EmptyNodeType(index));
        }
    }
}
