//! Integration tests for the runner driving real action processes.
//!
//! Actions are small shell scripts written into a temp directory, located the
//! same way the binary locates its sibling executables.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use conduit_pipeline::{
    ActionExecutionError, ActionLocator, Format, NodeError, NodeFailure, PipelineEngine,
    ProcessExecutor, ResolutionError, WorkflowDefinition, WorkflowError,
};
use serde_json::json;

struct Actions {
    dir: tempfile::TempDir,
    log: PathBuf,
}

impl Actions {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("invocations.log");
        Self { dir, log }
    }

    fn script(&self, name: &str, body: &str) {
        let path = self.dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// An action that logs its name and input, then echoes the input back.
    fn recorder(&self, name: &str) {
        self.script(
            name,
            &format!(
                "input=$(cat)\nprintf '%s %s\\n' '{name}' \"$input\" >> '{log}'\nprintf '{{\"node\":\"{name}\",\"received\":%s}}' \"$input\"",
                log = self.log.display()
            ),
        );
    }

    fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn engine(&self) -> PipelineEngine {
        let locator = ActionLocator::new(self.dir.path(), "conduit", "conduit");
        PipelineEngine::with_executor(
            Format::Json,
            Arc::new(ProcessExecutor::new(locator, Format::Json)),
        )
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn workflow(nodes: serde_json::Value) -> WorkflowDefinition {
    let text = json!({"name": "it", "description": "integration", "nodes": nodes}).to_string();
    WorkflowDefinition::parse(&text, Format::Json).unwrap()
}

#[tokio::test]
async fn test_all_nodes_run_in_order() {
    let actions = Actions::new();
    for name in ["alpha", "beta", "gamma"] {
        actions.recorder(name);
    }

    let wf = workflow(json!([
        {"id": "n1", "type": "gamma", "inputs_from_workflow": {"step": 1}},
        {"id": "n2", "type": "alpha", "inputs_from_workflow": {"step": 2}},
        {"id": "n3", "type": "beta", "inputs_from_workflow": {"step": 3}}
    ]));
    let ctx = actions.engine().run(&wf, json!({})).await.unwrap();

    assert_eq!(
        actions.invocations(),
        vec![
            r#"gamma {"step":1}"#.to_string(),
            r#"alpha {"step":2}"#.to_string(),
            r#"beta {"step":3}"#.to_string(),
        ]
    );
    assert_eq!(ctx.nodes().len(), 3);
    let order: Vec<&str> = ctx.completed().collect();
    assert_eq!(order, vec!["n1", "n2", "n3"]);
    assert_eq!(ctx.node("n2").unwrap().output["received"]["step"], 2);
}

#[tokio::test]
async fn test_outputs_feed_later_nodes() {
    let actions = Actions::new();
    actions.recorder("rec");

    let wf = workflow(json!([
        {"id": "first", "type": "rec", "inputs_from_workflow": {"msg": "{{.workflow_data.greeting}}"}},
        {"id": "second", "type": "rec", "inputs_from_workflow": {"msg": "got {{.nodes.first.output.received.msg}}"}}
    ]));
    let ctx = actions
        .engine()
        .run(&wf, json!({"greeting": "hello"}))
        .await
        .unwrap();

    assert_eq!(ctx.node("second").unwrap().output["received"]["msg"], "got hello");
}

#[tokio::test]
async fn test_numeric_reference_delivered_as_bare_numeral() {
    let actions = Actions::new();
    actions.recorder("rec");

    let wf = workflow(json!([
        {"id": "only", "type": "rec", "inputs_from_workflow": {"y": "{{.workflow_data.x}}"}}
    ]));
    actions.engine().run(&wf, json!({"x": 1})).await.unwrap();

    assert_eq!(actions.invocations(), vec![r#"rec {"y":"1"}"#.to_string()]);
}

#[tokio::test]
async fn test_non_zero_exit_stops_the_run() {
    let actions = Actions::new();
    actions.recorder("rec");
    actions.script("crash", "cat > /dev/null\necho 'disk full' >&2\nexit 3");

    let wf = workflow(json!([
        {"id": "a", "type": "rec", "inputs_from_workflow": {}},
        {"id": "b", "type": "crash", "inputs_from_workflow": {}},
        {"id": "c", "type": "rec", "inputs_from_workflow": {}}
    ]));
    let err = actions.engine().run(&wf, json!({})).await.unwrap_err();

    match &err {
        WorkflowError::NodeFailed {
            node_id,
            source:
                NodeFailure::Node(NodeError::ActionExecution(ActionExecutionError::NonZeroExit {
                    stderr,
                    ..
                })),
            context,
            ..
        } => {
            assert_eq!(node_id, "b");
            assert_eq!(stderr, "disk full");
            assert_eq!(context.nodes().len(), 1);
            assert!(context.node("a").is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // Only the node before the failure ran.
    assert_eq!(actions.invocations().len(), 1);
}

#[tokio::test]
async fn test_error_key_with_zero_exit_fails_node() {
    let actions = Actions::new();
    actions.script("grumpy", "cat > /dev/null\nprintf '{\"error\":\"bad input\"}'");

    let wf = workflow(json!([{"id": "g", "type": "grumpy", "inputs_from_workflow": {}}]));
    let err = actions.engine().run(&wf, json!({})).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "error executing node g: action returned error: bad input"
    );
}

#[tokio::test]
async fn test_error_key_with_non_zero_exit_is_reported_error() {
    let actions = Actions::new();
    actions.script(
        "strict",
        "cat > /dev/null\nprintf '{\"success\":false,\"message\":\"Invalid mode\",\"error\":\"mode must be create\"}'\nexit 1",
    );

    let wf = workflow(json!([{"id": "s", "type": "strict", "inputs_from_workflow": {}}]));
    let err = actions.engine().run(&wf, json!({})).await.unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::NodeFailed {
            source: NodeFailure::Node(NodeError::ActionReported { .. }),
            ..
        }
    ));
}

#[tokio::test]
async fn test_unparseable_output() {
    let actions = Actions::new();
    actions.script("garbage", "cat > /dev/null\necho 'definitely not json'");

    let wf = workflow(json!([{"id": "x", "type": "garbage", "inputs_from_workflow": {}}]));
    let err = actions.engine().run(&wf, json!({})).await.unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::NodeFailed {
            source: NodeFailure::Node(NodeError::OutputParse { .. }),
            ..
        }
    ));
}

#[tokio::test]
async fn test_stderr_does_not_change_outcome() {
    let actions = Actions::new();
    actions.script(
        "noisy",
        "cat > /dev/null\necho 'warning: slow disk' >&2\nprintf '{\"ok\":true}'",
    );

    let wf = workflow(json!([{"id": "n", "type": "noisy", "inputs_from_workflow": {}}]));
    let ctx = actions.engine().run(&wf, json!({})).await.unwrap();

    assert_eq!(ctx.node("n").unwrap().output, json!({"ok": true}));
}

#[tokio::test]
async fn test_action_that_ignores_stdin() {
    let actions = Actions::new();
    actions.script("deaf", "printf '{\"done\":true}'");

    let big = "x".repeat(256 * 1024);
    let wf = workflow(json!([{"id": "d", "type": "deaf", "inputs_from_workflow": {"blob": big}}]));
    let ctx = actions.engine().run(&wf, json!({})).await.unwrap();

    assert_eq!(ctx.node("d").unwrap().output["done"], true);
}

#[tokio::test]
async fn test_missing_action_executable() {
    let actions = Actions::new();
    let wf = workflow(json!([{"id": "m", "type": "not-installed", "inputs_from_workflow": {}}]));
    let err = actions.engine().run(&wf, json!({})).await.unwrap_err();

    match err {
        WorkflowError::NodeFailed {
            source:
                NodeFailure::Node(NodeError::ActionExecution(ActionExecutionError::Spawn {
                    path, ..
                })),
            ..
        } => assert_eq!(path, actions.path().join("not-installed")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_forward_reference_never_dispatches() {
    let actions = Actions::new();
    actions.recorder("rec");

    let wf = workflow(json!([
        {"id": "early", "type": "rec", "inputs_from_workflow": {"v": "{{.nodes.late.output.node}}"}},
        {"id": "late", "type": "rec", "inputs_from_workflow": {}}
    ]));
    let err = actions.engine().run(&wf, json!({})).await.unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::NodeFailed {
            source: NodeFailure::Resolution(ResolutionError::Undefined { .. }),
            ..
        }
    ));
    assert!(actions.invocations().is_empty());
}
