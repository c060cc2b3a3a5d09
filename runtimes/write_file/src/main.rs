//! File write action - writes content to a file path.
//!
//! Input fields:
//! - `path` (string, required): File to write
//! - `content` (string): Content to write
//! - `mode` (string, optional): `create` (default, fails if the file
//!   exists), `append`, or `overwrite`
//! - `mkdir_all` (bool, optional): Create missing parent directories
//!
//! Failures exit 1 with `{success: false, message, error}` on stdout.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use conduit_pipeline::Format;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Deserialize)]
struct WriteInput {
    #[serde(default)]
    path: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    mode: String,
    #[serde(default)]
    mkdir_all: bool,
}

#[derive(Debug, Default, Serialize)]
struct WriteOutput {
    success: bool,
    message: String,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl WriteOutput {
    fn failure(message: &str, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            error: Some(detail.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Create,
    Append,
    Overwrite,
}

impl WriteMode {
    fn parse(mode: &str) -> Option<Self> {
        match mode {
            "" | "create" => Some(WriteMode::Create),
            "append" => Some(WriteMode::Append),
            "overwrite" => Some(WriteMode::Overwrite),
            _ => None,
        }
    }

    fn open(self, path: &Path) -> std::io::Result<File> {
        let mut options = OpenOptions::new();
        options.write(true);
        match self {
            WriteMode::Create => options.create_new(true),
            WriteMode::Append => options.create(true).append(true),
            WriteMode::Overwrite => options.create(true).truncate(true),
        };
        options.open(path)
    }
}

/// Empty content is worth a warning unless `create` was asked for by name.
fn warns_on_empty_content(input: &WriteInput) -> bool {
    input.content.is_empty() && input.mode != "create"
}

/// Core processing logic, separated for testability.
fn process(input: &str, format: Format) -> WriteOutput {
    let input: WriteInput = match format.parse_as(input) {
        Ok(input) => input,
        Err(e) => return WriteOutput::failure(&format!("Failed to parse {format} input"), e),
    };

    if input.path.is_empty() {
        return WriteOutput::failure("Missing required field", "path is required");
    }

    let Some(mode) = WriteMode::parse(&input.mode) else {
        return WriteOutput::failure(
            "Invalid mode",
            format!(
                "mode must be one of: create, append, overwrite, got: {}",
                input.mode
            ),
        );
    };

    if warns_on_empty_content(&input) {
        warn!(path = %input.path, "Content is empty");
    }

    let path = Path::new(&input.path);
    if input.mkdir_all
        && let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        return WriteOutput::failure("Failed to create parent directories", e.to_string());
    }

    let mut file = match mode.open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return WriteOutput::failure(
                "File already exists",
                format!("file {} already exists and mode is 'create'", input.path),
            );
        }
        Err(e) => return WriteOutput::failure("Failed to open file", e.to_string()),
    };

    if let Err(e) = file.write_all(input.content.as_bytes()) {
        return WriteOutput::failure("Failed to write content", e.to_string());
    }

    let size = match file.metadata() {
        Ok(meta) => Some(meta.len()),
        Err(e) => {
            warn!(error = %e, "Could not get file info");
            None
        }
    };

    WriteOutput {
        success: true,
        message: format!(
            "Successfully wrote {} bytes to {}",
            input.content.len(),
            input.path
        ),
        path: input.path,
        size,
        error: None,
    }
}

fn emit(output: &WriteOutput, format: Format) {
    match format.to_text(output) {
        Ok(text) => println!("{}", text.trim_end()),
        Err(e) => warn!(error = %e, "Failed to encode output"),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();

    let format = Format::build_default();

    let mut input = String::new();
    let output = match std::io::stdin().read_to_string(&mut input) {
        Ok(_) => process(&input, format),
        Err(e) => WriteOutput::failure("Failed to read input", e.to_string()),
    };

    emit(&output, format);
    if !output.success {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(input: serde_json::Value) -> WriteOutput {
        process(&input.to_string(), Format::Json)
    }

    #[test]
    fn test_create_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.txt");

        let out = run(json!({"path": file.display().to_string(), "content": "hello"}));
        assert!(out.success, "{out:?}");
        assert_eq!(out.size, Some(5));
        assert_eq!(out.message, format!("Successfully wrote 5 bytes to {}", file.display()));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "hello");
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.txt");
        std::fs::write(&file, "keep").unwrap();

        let out = run(json!({"path": file.display().to_string(), "content": "new", "mode": "create"}));
        assert!(!out.success);
        assert_eq!(out.message, "File already exists");
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "keep");
    }

    #[test]
    fn test_append() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("log.txt");
        std::fs::write(&file, "one\n").unwrap();

        let out = run(json!({"path": file.display().to_string(), "content": "two\n", "mode": "append"}));
        assert!(out.success);
        assert_eq!(out.size, Some(8));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.txt");
        std::fs::write(&file, "a much longer original").unwrap();

        let out = run(json!({"path": file.display().to_string(), "content": "short", "mode": "overwrite"}));
        assert!(out.success);
        assert_eq!(out.size, Some(5));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "short");
    }

    #[test]
    fn test_mkdir_all() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a/b/c.txt");

        let out = run(json!({"path": file.display().to_string(), "content": "x", "mkdir_all": true}));
        assert!(out.success, "{out:?}");
        assert!(file.exists());
    }

    #[test]
    fn test_missing_parent_without_mkdir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("missing/c.txt");

        let out = run(json!({"path": file.display().to_string(), "content": "x"}));
        assert!(!out.success);
        assert_eq!(out.message, "Failed to open file");
    }

    #[test]
    fn test_invalid_mode() {
        let out = run(json!({"path": "/tmp/x", "content": "x", "mode": "truncate"}));
        assert!(!out.success);
        assert_eq!(out.message, "Invalid mode");
        assert_eq!(
            out.error.as_deref(),
            Some("mode must be one of: create, append, overwrite, got: truncate")
        );
    }

    #[test]
    fn test_missing_path() {
        let out = run(json!({"content": "x"}));
        assert!(!out.success);
        assert_eq!(out.error.as_deref(), Some("path is required"));
    }

    #[test]
    fn test_unparseable_input() {
        let out = process("{", Format::Json);
        assert!(!out.success);
        assert_eq!(out.message, "Failed to parse JSON input");
    }

    #[test]
    fn test_empty_content_warning() {
        let input = |value: serde_json::Value| -> WriteInput { serde_json::from_value(value).unwrap() };

        assert!(warns_on_empty_content(&input(json!({"path": "p"}))));
        assert!(warns_on_empty_content(&input(json!({"path": "p", "mode": "append"}))));
        assert!(!warns_on_empty_content(&input(json!({"path": "p", "mode": "create"}))));
        assert!(!warns_on_empty_content(&input(json!({"path": "p", "content": "x"}))));
    }

    #[test]
    fn test_failure_shape() {
        let out = serde_json::to_value(WriteOutput::failure("Invalid mode", "bad")).unwrap();
        assert_eq!(
            out,
            json!({"success": false, "message": "Invalid mode", "path": "", "error": "bad"})
        );
    }
}
