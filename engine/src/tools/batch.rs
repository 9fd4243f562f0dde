//! Batch tool
//!
//! Runs several independent tool calls concurrently and returns one result per
//! call, in input order. `Bash` and `Batch` are refused inside a batch so a
//! single call cannot fan out into processes or nested batches.
//!
//! Sub-calls are not coordinated with each other: two writes to the same file
//! in one batch race and the last one to finish wins.

use async_trait::async_trait;
use futures::future::join_all;
use sdk::types::{Parameters, ToolCall, ToolOutcome, ToolResult};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{Tool, ToolContext, ToolRegistry};

/// Tools that may not run inside a batch
const DISALLOWED: &[&str] = &["bash", "batch"];

pub struct BatchTool;

#[async_trait]
impl Tool for BatchTool {
    fn name(&self) -> &'static str {
        "Batch"
    }

    fn description(&self) -> &'static str {
        "Execute several independent tool calls in parallel. Bash and Batch cannot be used inside a batch. Each sub-call reports its own status."
    }

    fn parameters(&self) -> &'static str {
        r#"{"calls": "non-empty array of {\"name\": ..., \"parameters\": {...}} (required)"}"#
    }

    async fn execute(&self, params: &Parameters, ctx: &ToolContext<'_>) -> ToolOutcome {
        let calls = match params.get("calls") {
            Some(Value::Array(calls)) if !calls.is_empty() => calls,
            _ => {
                return ToolOutcome::error(
                    "Batch error: \"calls\" parameter must be a non-empty array of tool calls.",
                )
            }
        };

        let results = BatchExecutor::new(ctx.registry).run(calls).await;
        ToolOutcome::success(json!(results))
    }
}

/// Executes a list of raw sub-calls through the registry
pub struct BatchExecutor<'a> {
    registry: &'a ToolRegistry,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(registry: &'a ToolRegistry) -> Self {
        Self { registry }
    }

    /// Run every sub-call concurrently; never fails as a whole
    pub async fn run(&self, calls: &[Value]) -> Vec<ToolResult> {
        info!("Batch executing {} calls", calls.len());
        join_all(calls.iter().map(|raw| self.run_one(raw))).await
    }

    async fn run_one(&self, raw: &Value) -> ToolResult {
        let name = raw.get("name").and_then(Value::as_str);
        let parameters = raw.get("parameters").and_then(Value::as_object);

        let (Some(name), Some(parameters)) = (name, parameters) else {
            warn!("Malformed sub-call in batch: {}", raw);
            return ToolResult::new(
                name.unwrap_or("UnknownTool"),
                raw.get("parameters").cloned().unwrap_or_else(|| json!({})),
                ToolOutcome::error("Malformed sub-tool call in Batch: missing name or parameters."),
            );
        };

        if DISALLOWED.iter().any(|d| d.eq_ignore_ascii_case(name)) {
            warn!("Refusing '{}' inside batch", name);
            return ToolResult::new(
                name,
                Value::Object(parameters.clone()),
                ToolOutcome::error(format!("Tool \"{}\" cannot be used within batch.", name)),
            );
        }

        let call = ToolCall::new(name, parameters.clone());
        let outcome = self.registry.dispatch(&call).await;
        ToolResult::new(name, Value::Object(call.parameters), outcome)
    }
}
