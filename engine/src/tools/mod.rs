pub mod batch;
pub mod filesystem;
pub mod search;
pub mod terminal;
pub mod web;

pub use batch::BatchTool;
pub use filesystem::{EditTool, LsTool, ReadTool, TreeTool, WriteTool};
pub use search::{GlobTool, GrepTool};
pub use terminal::BashTool;
pub use web::WebFetchTool;

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::{Parameters, ToolCall, ToolOutcome};
use std::path::Path;
use tracing::{debug, warn};

use crate::config::ToolsConfig;
use crate::fs_guard::PathGuard;
use crate::process::ProcessRunner;

/// Every tool name the registry must carry, in the order they are advertised
pub const TOOL_NAMES: &[&str] = &[
    "Bash", "Batch", "Edit", "Glob", "Grep", "LS", "Read", "Tree", "WebFetch", "Write",
];

/// A capability the model can invoke by name.
///
/// Implementations never fail: every fault is translated into the error
/// branch of the returned `ToolOutcome` so the model can read it.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Parameter documentation rendered into the system prompt
    fn parameters(&self) -> &'static str;

    async fn execute(&self, params: &Parameters, ctx: &ToolContext<'_>) -> ToolOutcome;
}

/// Services shared by all tools
#[derive(Debug, Clone)]
pub struct ToolEnv {
    pub guard: PathGuard,
    pub runner: ProcessRunner,
    pub http: reqwest::Client,
    pub settings: ToolsConfig,
}

impl ToolEnv {
    /// Build the tool services for a project root
    pub fn new(project_root: &Path, settings: ToolsConfig) -> Result<Self, EngineError> {
        let guard = PathGuard::new(project_root)?;
        let runner = ProcessRunner::new(guard.root()).with_timeout(settings.bash_timeout());
        let http = reqwest::Client::builder()
            .timeout(settings.fetch_timeout())
            .build()
            .map_err(|e| EngineError::Network(e.to_string()))?;

        Ok(Self {
            guard,
            runner,
            http,
            settings,
        })
    }
}

/// What a tool sees during one execution
pub struct ToolContext<'a> {
    pub env: &'a ToolEnv,
    pub registry: &'a ToolRegistry,
}

impl ToolContext<'_> {
    pub fn guard(&self) -> &PathGuard {
        &self.env.guard
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.env.runner
    }

    pub fn settings(&self) -> &ToolsConfig {
        &self.env.settings
    }
}

/// Registry of the tools the model can call.
///
/// The set is fixed at construction and verified against `TOOL_NAMES`.
/// Lookup is case-insensitive.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    env: ToolEnv,
}

impl ToolRegistry {
    /// Create the registry with every built-in tool
    pub fn new(env: ToolEnv) -> Result<Self, EngineError> {
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(BashTool),
            Box::new(BatchTool),
            Box::new(EditTool),
            Box::new(GlobTool),
            Box::new(GrepTool),
            Box::new(LsTool),
            Box::new(ReadTool),
            Box::new(TreeTool),
            Box::new(WebFetchTool),
            Box::new(WriteTool),
        ];
        Self::with_tools(env, tools)
    }

    fn with_tools(env: ToolEnv, tools: Vec<Box<dyn Tool>>) -> Result<Self, EngineError> {
        for expected in TOOL_NAMES {
            let count = tools
                .iter()
                .filter(|t| t.name().eq_ignore_ascii_case(expected))
                .count();
            if count != 1 {
                return Err(EngineError::Config(format!(
                    "Tool registry must contain exactly one '{}' (found {})",
                    expected, count
                )));
            }
        }
        if tools.len() != TOOL_NAMES.len() {
            return Err(EngineError::Config(format!(
                "Tool registry has {} tools, expected {}",
                tools.len(),
                TOOL_NAMES.len()
            )));
        }

        Ok(Self { tools, env })
    }

    pub fn env(&self) -> &ToolEnv {
        &self.env
    }

    /// Look a tool up by name, ignoring ASCII case
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .map(|t| t.as_ref())
    }

    /// Dispatch a tool call by name.
    ///
    /// Errors are returned as error outcomes so the model can see them and
    /// self-correct.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolOutcome {
        debug!(
            "Dispatching tool '{}' with params: {}",
            call.name,
            serde_json::Value::Object(call.parameters.clone())
        );

        let Some(tool) = self.get(&call.name) else {
            warn!("Unknown tool requested: {}", call.name);
            let err = EngineError::ToolNotFound {
                name: call.name.clone(),
                available: self.names().join(", "),
            };
            return ToolOutcome::error(err.to_string());
        };

        let ctx = ToolContext {
            env: &self.env,
            registry: self,
        };
        tool.execute(&call.parameters, &ctx).await
    }

    /// Names of all registered tools
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Generate a system prompt describing the protocol and every tool.
    pub fn system_prompt(&self) -> String {
        let root = self.env.guard.root().display();
        let mut parts = vec![
            "You are Delve, an autonomous assistant working inside a command-line environment.".to_string(),
            format!("You are operating within the project directory: \"{}\".", root),
            "All file paths you give to tools must be relative to this directory.".to_string(),
            String::new(),
            "IMPORTANT RULES:".to_string(),
            "1. Explain your plan before acting. For multi-step work you may emit one <plan> block containing a JSON array of step descriptions, e.g. <plan>[\"Locate the code\", \"Apply the change\", \"Run the tests\"]</plan>. Each step will then be handed back to you in order.".to_string(),
            "2. To call a tool, emit a <tool_call> block containing a JSON object with a \"name\" string and a \"parameters\" object.".to_string(),
            r#"   Example: <tool_call>{"name": "Read", "parameters": {"filePath": "src/app.js"}}</tool_call>"#.to_string(),
            "3. You may emit several <tool_call> blocks in one reply. They run in order and all results come back together.".to_string(),
            "4. Results arrive in a user message shaped like:".to_string(),
            r#"   {"tool_responses": [{"tool_name": "...", "parameters": {...}, "status": "success" | "error", "output": ...}]}"#.to_string(),
            "5. Never guess tool output. Wait for the real result. If a tool fails, read the error and try another approach.".to_string(),
            "6. When the task is done, answer in plain text without any <tool_call> block.".to_string(),
            String::new(),
            "Available tools:".to_string(),
        ];

        for tool in &self.tools {
            parts.push(String::new());
            parts.push(format!("## {}", tool.name()));
            parts.push(tool.description().to_string());
            parts.push(format!("Parameters: {}", tool.parameters()));
        }

        parts.join("\n")
    }
}

/// Render an engine error as the error outcome of `tool`
pub(crate) fn fail(tool: &str, err: EngineError) -> ToolOutcome {
    warn!("{} failed: {}", tool, err);
    ToolOutcome::from_error(tool, &err)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    /// A registry rooted at a fresh temporary directory
    pub fn registry() -> (TempDir, ToolRegistry) {
        let temp = TempDir::new().unwrap();
        let env = ToolEnv::new(temp.path(), ToolsConfig::default()).unwrap();
        let registry = ToolRegistry::new(env).unwrap();
        (temp, registry)
    }

    pub fn call(name: &str, params: Value) -> ToolCall {
        ToolCall::new(name, params.as_object().cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{call, registry};
    use super::*;
    use sdk::types::ToolStatus;
    use serde_json::json;

    #[test]
    fn test_registry_is_complete() {
        let (_temp, registry) = registry();
        let mut names = registry.names();
        names.sort_unstable();
        let mut expected = TOOL_NAMES.to_vec();
        expected.sort_unstable();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_incomplete_registry_rejected() {
        let temp = tempfile::TempDir::new().unwrap();
        let env = ToolEnv::new(temp.path(), ToolsConfig::default()).unwrap();
        let result = ToolRegistry::with_tools(env, vec![Box::new(ReadTool)]);
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_lookup_ignores_case() {
        let (_temp, registry) = registry();
        assert_eq!(registry.get("read").map(|t| t.name()), Some("Read"));
        assert_eq!(registry.get("WEBFETCH").map(|t| t.name()), Some("WebFetch"));
        assert!(registry.get("Delete").is_none());
    }

    #[tokio::test]
    async fn test_unknown_tool_lists_available() {
        let (_temp, registry) = registry();
        let outcome = registry.dispatch(&call("Delete", json!({}))).await;

        assert_eq!(outcome.status, ToolStatus::Error);
        let text = outcome.output.as_str().unwrap();
        assert!(text.starts_with("Unknown tool 'Delete'"));
        assert!(text.contains("Read"));
        assert!(text.contains("Bash"));
    }

    #[test]
    fn test_system_prompt_mentions_every_tool() {
        let (temp, registry) = registry();
        let prompt = registry.system_prompt();

        for name in TOOL_NAMES {
            assert!(prompt.contains(&format!("## {}", name)));
        }
        assert!(prompt.contains("<tool_call>"));
        assert!(prompt.contains("<plan>"));
        assert!(prompt.contains(&temp.path().canonicalize().unwrap().display().to_string()));
    }
}
