//! Example demonstrating direct tool dispatch without a model
//!
//! This example shows how to:
//! - Confine the tools to a project directory
//! - Dispatch single calls and a batch
//! - Read the `tool_responses` shape the model receives
//!
//! Run with: cargo run --example tool_dispatch_example

use delve_engine::config::ToolsConfig;
use delve_engine::tools::{ToolEnv, ToolRegistry};
use sdk::types::{ToolCall, ToolResponses, ToolResult};
use serde_json::{json, Value};
use tempfile::TempDir;

fn call(name: &str, params: Value) -> ToolCall {
    ToolCall::new(name, params.as_object().cloned().unwrap_or_default())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Tool Dispatch Example ===\n");

    let project = TempDir::new()?;
    let registry = ToolRegistry::new(ToolEnv::new(project.path(), ToolsConfig::default())?)?;
    println!("✓ Registry ready with tools: {}", registry.names().join(", "));

    let calls = vec![
        call("Write", json!({"filePath": "notes/todo.md", "content": "- ship it\n- test it\n"})),
        call("Grep", json!({"regex": "ship", "filePath": "notes/todo.md"})),
        call("Read", json!({"filePath": "../outside.txt"})),
        call(
            "Batch",
            json!({"calls": [
                {"name": "LS", "parameters": {"dirPath": "notes"}},
                {"name": "Tree", "parameters": {}}
            ]}),
        ),
    ];

    let mut results = Vec::new();
    for call in calls {
        let params = Value::Object(call.parameters.clone());
        let outcome = registry.dispatch(&call).await;
        println!("{:>6} -> {:?}", call.name, outcome.status);
        results.push(ToolResult::new(call.name, params, outcome));
    }

    let message = ToolResponses {
        tool_responses: results,
    };
    println!("\nMessage sent back to the model:");
    println!("{}", serde_json::to_string_pretty(&message)?);

    Ok(())
}
