//! Sandbox tests: no tool may touch a path outside the project root

use delve_engine::config::ToolsConfig;
use delve_engine::tools::{ToolEnv, ToolRegistry};
use sdk::types::{ToolCall, ToolStatus};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

/// A project directory inside a parent that also holds a secret file
fn sandbox() -> (TempDir, ToolRegistry) {
    let parent = TempDir::new().unwrap();
    fs::write(parent.path().join("secret.txt"), "top secret").unwrap();
    let project = parent.path().join("project");
    fs::create_dir(&project).unwrap();
    fs::write(project.join("inside.txt"), "fine").unwrap();

    let env = ToolEnv::new(&project, ToolsConfig::default()).unwrap();
    (parent, ToolRegistry::new(env).unwrap())
}

fn call(name: &str, params: Value) -> ToolCall {
    ToolCall::new(name, params.as_object().cloned().unwrap())
}

fn assert_traversal(outcome: sdk::types::ToolOutcome) {
    assert_eq!(outcome.status, ToolStatus::Error);
    let message = outcome.output.as_str().unwrap().to_string();
    assert!(
        message.contains("Path traversal detected"),
        "unexpected message: {}",
        message
    );
}

#[tokio::test]
async fn test_read_outside_root_rejected() {
    let (_parent, registry) = sandbox();

    for path in [
        "../secret.txt",
        "sub/../../secret.txt",
        "sub/../inside.txt",
        "/etc/passwd",
    ] {
        let outcome = registry.dispatch(&call("Read", json!({"filePath": path}))).await;
        assert_traversal(outcome);
    }
}

#[tokio::test]
async fn test_write_outside_root_creates_nothing() {
    let (parent, registry) = sandbox();

    let outcome = registry
        .dispatch(&call("Write", json!({"filePath": "../escaped.txt", "content": "x"})))
        .await;

    assert_traversal(outcome);
    assert!(!parent.path().join("escaped.txt").exists());
}

#[tokio::test]
async fn test_listing_tools_stay_inside() {
    let (_parent, registry) = sandbox();

    for (name, params) in [
        ("LS", json!({"dirPath": ".."})),
        ("Tree", json!({"dirPath": "../"})),
        ("Glob", json!({"pattern": "../*.txt"})),
        ("Grep", json!({"regex": "secret", "filePath": "../secret.txt"})),
        ("Edit", json!({"filePath": "../secret.txt", "startLine": 1, "endLine": 1, "newContent": "x"})),
    ] {
        let outcome = registry.dispatch(&call(name, params)).await;
        assert_eq!(outcome.status, ToolStatus::Error, "{} escaped the root", name);
    }
}

#[tokio::test]
async fn test_inside_paths_still_work() {
    let (_parent, registry) = sandbox();

    let outcome = registry
        .dispatch(&call("Read", json!({"filePath": "./inside.txt"})))
        .await;
    assert_eq!(outcome.status, ToolStatus::Success);
    assert_eq!(outcome.output, json!("fine"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_bash_runs_in_project_root() {
    let (parent, registry) = sandbox();

    let outcome = registry.dispatch(&call("Bash", json!({"command": "pwd"}))).await;

    assert_eq!(outcome.status, ToolStatus::Success);
    let pwd = outcome.output["stdout"].as_str().unwrap().trim().to_string();
    let project = parent.path().join("project").canonicalize().unwrap();
    assert_eq!(std::path::PathBuf::from(pwd), project);
}
