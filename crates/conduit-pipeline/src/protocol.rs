//! Action process protocol.
//!
//! Every node type is an executable that receives its resolved input as one
//! document on stdin and writes one document to stdout, both in the build's
//! interchange format. A node fails when the process exits non-zero or when
//! its output carries a top-level `error` key; the `error` key wins when both
//! are present, since actions do not agree on exit-code conventions.

use std::path::Path;

use serde_json::Value;

use crate::error::{ActionExecutionError, NodeError};
use crate::format::Format;

/// Key that marks an action's output as a reported failure.
pub const ERROR_KEY: &str = "error";

/// What a finished action process left behind.
#[derive(Debug, Clone)]
pub struct ActionExit<'a> {
    /// Path of the executable, for error messages.
    pub path: &'a Path,
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Rendered exit status (`exit status: 1`, `signal: 9 (SIGKILL)`, ...).
    pub status: String,
    pub stdout: &'a [u8],
    pub stderr: &'a [u8],
}

/// Turn a finished action process into the node's output or failure.
pub fn interpret(exit: &ActionExit<'_>, format: Format) -> Result<Value, NodeError> {
    let parsed = parse_output(exit.stdout, format);

    if !exit.success {
        // An error payload explains the failure better than the exit status.
        if let Ok(Value::Object(map)) = &parsed
            && let Some(error) = map.get(ERROR_KEY)
        {
            return Err(NodeError::ActionReported {
                error: error.clone(),
            });
        }
        return Err(ActionExecutionError::NonZeroExit {
            path: exit.path.to_path_buf(),
            status: exit.status.clone(),
            stderr: String::from_utf8_lossy(exit.stderr).trim_end().to_string(),
        }
        .into());
    }

    check_output(parsed?, format)
}

/// Validate a parsed output value: it must be a mapping without an `error` key.
pub fn check_output(output: Value, format: Format) -> Result<Value, NodeError> {
    match output {
        Value::Object(mut map) => match map.remove(ERROR_KEY) {
            Some(error) => Err(NodeError::ActionReported { error }),
            None => Ok(Value::Object(map)),
        },
        other => Err(NodeError::OutputParse {
            format: format.name(),
            message: format!("expected a mapping, got {}", describe(&other)),
        }),
    }
}

fn parse_output(stdout: &[u8], format: Format) -> Result<Value, NodeError> {
    let text = std::str::from_utf8(stdout).map_err(|e| NodeError::OutputParse {
        format: format.name(),
        message: format!("output is not valid UTF-8: {}", e),
    })?;
    format.parse(text).map_err(|message| NodeError::OutputParse {
        format: format.name(),
        message,
    })
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
