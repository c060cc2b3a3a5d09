//! Node executors: turn a resolved input into an action's output.
//!
//! [`ProcessExecutor`] runs each node type as a separate executable that sits
//! next to the orchestrator binary. [`RegistryExecutor`] dispatches to
//! in-process handlers instead; it avoids a process per node but a panicking
//! handler takes the whole run down with it.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{ActionExecutionError, NodeError};
use crate::format::Format;
use crate::protocol::{self, ActionExit};

/// Default program name; replaced by the node type to find an action.
pub const DEFAULT_PROGRAM_NAME: &str = "conduit";

/// Runs one node's action.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute the action named by `node_type` with an already-resolved input.
    async fn execute(&self, node_type: &str, input: &Value) -> Result<Value, NodeError>;
}

#[async_trait]
impl<T: ActionExecutor + ?Sized> ActionExecutor for Arc<T> {
    async fn execute(&self, node_type: &str, input: &Value) -> Result<Value, NodeError> {
        (**self).execute(node_type, input).await
    }
}

// ---------------------------------------------------------------------------
// Locating sibling executables
// ---------------------------------------------------------------------------

/// Maps a node type to the path of its executable.
///
/// Actions are co-located with the orchestrator and named after their type:
/// the first occurrence of the program name in the orchestrator's file name
/// is replaced by the node type, so `conduit` finds `echo`, `conduit-yaml`
/// finds `echo-yaml`, and `conduit.exe` finds `echo.exe`.
#[derive(Debug, Clone)]
pub struct ActionLocator {
    dir: PathBuf,
    file_name: String,
    program_name: String,
}

impl ActionLocator {
    pub fn new(
        dir: impl Into<PathBuf>,
        file_name: impl Into<String>,
        program_name: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
            program_name: program_name.into(),
        }
    }

    /// Locate actions next to the currently running binary.
    pub fn from_current_exe(program_name: impl Into<String>) -> io::Result<Self> {
        let exe = std::env::current_exe()?;
        let dir = exe
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("executable path has no parent directory"))?;
        let file_name = exe
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::other("executable path has no file name"))?;
        Ok(Self::new(dir, file_name, program_name))
    }

    /// Look for actions in another directory, keeping the naming rule.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the executable implementing `node_type`.
    pub fn locate(&self, node_type: &str) -> Result<PathBuf, ActionExecutionError> {
        if node_type.trim().is_empty()
            || node_type.contains(['/', '\\'])
            || node_type == "."
            || node_type == ".."
        {
            return Err(ActionExecutionError::InvalidActionType(
                node_type.to_string(),
            ));
        }

        let file_name = if !self.program_name.is_empty() && self.file_name.contains(&self.program_name)
        {
            self.file_name.replacen(&self.program_name, node_type, 1)
        } else {
            format!("{}{}", node_type, std::env::consts::EXE_SUFFIX)
        };
        Ok(self.dir.join(file_name))
    }
}

// ---------------------------------------------------------------------------
// Process executor
// ---------------------------------------------------------------------------

/// Runs each node as a child process speaking the stdin/stdout protocol.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    locator: ActionLocator,
    format: Format,
}

impl ProcessExecutor {
    pub fn new(locator: ActionLocator, format: Format) -> Self {
        Self { locator, format }
    }

    pub fn locator(&self) -> &ActionLocator {
        &self.locator
    }
}

#[async_trait]
impl ActionExecutor for ProcessExecutor {
    async fn execute(&self, node_type: &str, input: &Value) -> Result<Value, NodeError> {
        let path = self.locator.locate(node_type)?;
        let payload = self.format.to_text(input).map_err(|e| ActionExecutionError::Io {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;

        debug!(node_type, path = %path.display(), input = %payload, "Sending to action");

        let mut child = Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ActionExecutionError::Spawn {
                path: path.clone(),
                source,
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| ActionExecutionError::Io {
            path: path.clone(),
            source: io::Error::other("child stdin was not captured"),
        })?;

        // Feed stdin while draining stdout/stderr so neither side can block the other.
        let write_input = async move {
            let result = stdin.write_all(payload.as_bytes()).await;
            drop(stdin);
            match result {
                // The action exited without reading everything; its exit
                // status and output decide the outcome.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };
        let (written, output) = tokio::join!(write_input, child.wait_with_output());

        let output = output.map_err(|source| ActionExecutionError::Io {
            path: path.clone(),
            source,
        })?;
        written.map_err(|source| ActionExecutionError::Io {
            path: path.clone(),
            source,
        })?;

        let exit = ActionExit {
            path: &path,
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: &output.stdout,
            stderr: &output.stderr,
        };
        let result = protocol::interpret(&exit, self.format);

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim_end();
        if !stderr.is_empty() {
            match &result {
                Ok(_) => info!(node_type, stderr = %stderr, "Action stderr"),
                Err(_) => warn!(node_type, stderr = %stderr, "Action stderr output"),
            }
        }
        if result.is_ok() {
            debug!(
                node_type,
                output = %String::from_utf8_lossy(&output.stdout).trim_end(),
                "Action output"
            );
        }

        result
    }
}

// ---------------------------------------------------------------------------
// In-process registry
// ---------------------------------------------------------------------------

/// An in-process action implementation. `Err` is reported as the action's
/// `error` field.
pub type ActionHandler = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// Dispatches node types to handlers registered in this process.
#[derive(Clone, Default)]
pub struct RegistryExecutor {
    handlers: HashMap<String, ActionHandler>,
    format: Format,
}

impl RegistryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a node type, replacing any previous one.
    pub fn with_handler<F>(mut self, node_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.handlers.insert(node_type.into(), Arc::new(handler));
        self
    }

    /// Format named in errors about malformed handler output.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn has_handler(&self, node_type: &str) -> bool {
        self.handlers.contains_key(node_type)
    }
}

impl std::fmt::Debug for RegistryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&String> = self.handlers.keys().collect();
        types.sort();
        f.debug_struct("RegistryExecutor")
            .field("types", &types)
            .field("format", &self.format)
            .finish()
    }
}

#[async_trait]
impl ActionExecutor for RegistryExecutor {
    async fn execute(&self, node_type: &str, input: &Value) -> Result<Value, NodeError> {
        let handler = self
            .handlers
            .get(node_type)
            .ok_or_else(|| ActionExecutionError::UnknownAction(node_type.to_string()))?;

        debug!(node_type, input = %input, "Dispatching to in-process handler");

        match handler(input) {
            Ok(output) => protocol::check_output(output, self.format),
            Err(message) => Err(NodeError::ActionReported {
                error: Value::String(message),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_locate_replaces_program_name() {
        let locator = ActionLocator::new("/opt/conduit/bin", "conduit", "conduit");
        assert_eq!(
            locator.locate("echo").unwrap(),
            PathBuf::from("/opt/conduit/bin/echo")
        );
    }

    #[test]
    fn test_locate_keeps_suffixes() {
        let locator = ActionLocator::new("/opt/bin", "conduit-yaml", "conduit");
        assert_eq!(
            locator.locate("write-file").unwrap(),
            PathBuf::from("/opt/bin/write-file-yaml")
        );

        let locator = ActionLocator::new("C:/tools", "conduit.exe", "conduit");
        assert_eq!(
            locator.locate("echo").unwrap(),
            PathBuf::from("C:/tools/echo.exe")
        );
    }

    #[test]
    fn test_locate_only_touches_file_name() {
        // A directory that happens to contain the program name is left alone.
        let locator = ActionLocator::new("/home/conduit/bin", "conduit", "conduit");
        assert_eq!(
            locator.locate("echo").unwrap(),
            PathBuf::from("/home/conduit/bin/echo")
        );
    }

    #[test]
    fn test_locate_falls_back_to_type_name() {
        let locator = ActionLocator::new("/opt/bin", "orchestrator", "conduit");
        let expected = format!("/opt/bin/echo{}", std::env::consts::EXE_SUFFIX);
        assert_eq!(locator.locate("echo").unwrap(), PathBuf::from(expected));
    }

    #[test]
    fn test_locate_with_dir_override() {
        let locator = ActionLocator::new("/opt/bin", "conduit", "conduit").with_dir("/srv/actions");
        assert_eq!(locator.dir(), Path::new("/srv/actions"));
        assert_eq!(
            locator.locate("http-request").unwrap(),
            PathBuf::from("/srv/actions/http-request")
        );
    }

    #[test]
    fn test_locate_rejects_paths() {
        let locator = ActionLocator::new("/opt/bin", "conduit", "conduit");
        for bad in ["", "  ", "../etc/passwd", "sub/echo", "..", "a\\b"] {
            assert!(
                matches!(
                    locator.locate(bad),
                    Err(ActionExecutionError::InvalidActionType(_))
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_from_current_exe() {
        let locator = ActionLocator::from_current_exe(DEFAULT_PROGRAM_NAME).unwrap();
        let exe = std::env::current_exe().unwrap();
        assert_eq!(locator.dir(), exe.parent().unwrap());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ProcessExecutor::new(
            ActionLocator::new(dir.path(), "conduit", "conduit"),
            Format::Json,
        );
        let err = executor.execute("missing", &json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            NodeError::ActionExecution(ActionExecutionError::Spawn { .. })
        ));
    }

    fn echo_registry() -> RegistryExecutor {
        RegistryExecutor::new().with_handler("echo", |input| {
            let message = input
                .get("message")
                .and_then(Value::as_str)
                .ok_or("Missing required field: message")?;
            let prefix = input.get("prefix").and_then(Value::as_str).unwrap_or("");
            Ok(json!({
                "echoed_message": format!("{prefix}{message}"),
                "original_input": input,
            }))
        })
    }

    #[tokio::test]
    async fn test_registry_dispatch() {
        let executor = echo_registry();
        assert!(executor.has_handler("echo"));
        let out = executor
            .execute("echo", &json!({"message": "hi", "prefix": "["}))
            .await
            .unwrap();
        assert_eq!(out["echoed_message"], "[hi");
    }

    #[tokio::test]
    async fn test_registry_handler_error_is_reported() {
        let err = echo_registry()
            .execute("echo", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "action returned error: Missing required field: message"
        );
    }

    #[tokio::test]
    async fn test_registry_unknown_type() {
        let err = echo_registry()
            .execute("nope", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NodeError::ActionExecution(ActionExecutionError::UnknownAction(_))
        ));
    }

    #[tokio::test]
    async fn test_registry_error_key_in_output() {
        let executor = RegistryExecutor::new()
            .with_handler("flaky", |_| Ok(json!({"error": "upstream unavailable"})));
        let err = executor.execute("flaky", &json!({})).await.unwrap_err();
        assert!(matches!(err, NodeError::ActionReported { .. }));
    }

    #[tokio::test]
    async fn test_registry_non_mapping_output_names_format() {
        let executor = RegistryExecutor::new()
            .with_format(Format::Yaml)
            .with_handler("list", |_| Ok(json!([1, 2])));
        let err = executor.execute("list", &json!({})).await.unwrap_err();
        match err {
            NodeError::OutputParse { format, message } => {
                assert_eq!(format, "YAML");
                assert_eq!(message, "expected a mapping, got a sequence");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_arc_executor_delegates() {
        let executor: Arc<dyn ActionExecutor> = Arc::new(echo_registry());
        let out = executor
            .execute("echo", &json!({"message": "x"}))
            .await
            .unwrap();
        assert_eq!(out["echoed_message"], "x");
    }
}
