//! Bash tool
//!
//! Runs shell commands in the project root through `ProcessRunner`. Foreground
//! commands are bounded by a timeout; `background: true` starts a detached
//! process whose output is never observed.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::{param_bool_opt, param_i64_opt, param_str, Parameters, ToolOutcome};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use super::{fail, Tool, ToolContext};
use crate::process::ProcessOutcome;

/// Upper bound for a per-call timeout override
const MAX_TIMEOUT_SECS: i64 = 600;

pub struct BashTool;

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &'static str {
        "Bash"
    }

    fn description(&self) -> &'static str {
        "Execute a shell command in the project directory. For commands that never finish on their own (dev servers, watchers) set \"background\": true; their output is not captured. Use with care: the command can modify the system."
    }

    fn parameters(&self) -> &'static str {
        r#"{"command": "shell command (required)", "background": "true to start detached and return the PID (optional, default false)", "timeout": "foreground timeout in seconds, at most 600 (optional, default 30)"}"#
    }

    async fn execute(&self, params: &Parameters, ctx: &ToolContext<'_>) -> ToolOutcome {
        let command = match param_str(params, "command") {
            Ok(c) if !c.trim().is_empty() => c,
            Ok(_) => return fail(self.name(), EngineError::MissingParameter("command".to_string())),
            Err(e) => return fail(self.name(), e),
        };

        if param_bool_opt(params, "background").unwrap_or(false) {
            return run_background(command, ctx);
        }

        let timeout = match timeout_override(params) {
            Ok(Some(t)) => t,
            Ok(None) => ctx.runner().default_timeout(),
            Err(e) => return fail(self.name(), e),
        };

        match ctx.runner().run_with_timeout(command, timeout).await {
            Ok(outcome) => render(outcome),
            Err(e) => fail(self.name(), EngineError::ProcessSpawn(e.to_string())),
        }
    }
}

fn timeout_override(params: &Parameters) -> Result<Option<Duration>, EngineError> {
    match param_i64_opt(params, "timeout")? {
        None => Ok(None),
        Some(secs) if (1..=MAX_TIMEOUT_SECS).contains(&secs) => {
            Ok(Some(Duration::from_secs(secs as u64)))
        }
        Some(_) => Err(EngineError::InvalidParameter {
            name: "timeout".to_string(),
            reason: format!("must be between 1 and {} seconds", MAX_TIMEOUT_SECS),
        }),
    }
}

fn run_background(command: &str, ctx: &ToolContext<'_>) -> ToolOutcome {
    match ctx.runner().spawn_detached(command) {
        Ok(detached) => {
            info!("Background PID {} for: {}", detached.pid, command);
            ToolOutcome::success(json!({
                "pid": detached.pid,
                "stdout": format!(
                    "Command '{}' initiated in background with PID: {}. Output is not captured.",
                    command, detached.pid
                ),
                "stderr": "",
            }))
        }
        Err(e) => fail("Bash", EngineError::ProcessSpawn(e.to_string())),
    }
}

fn render(outcome: ProcessOutcome) -> ToolOutcome {
    match outcome {
        ProcessOutcome::Completed(output) => ToolOutcome::success(json!({
            "stdout": output.stdout,
            "stderr": output.stderr,
            "exitCode": 0,
        })),
        ProcessOutcome::Failed { code, output } => {
            warn!("Command exited with code {}", code);
            ToolOutcome::error(json!({
                "message": format!("Command exited with code {}.", code),
                "stdout": output.stdout,
                "stderr": output.stderr,
                "exitCode": code,
            }))
        }
        ProcessOutcome::TimedOut { after, output } => ToolOutcome::error(json!({
            "status": "timeout",
            "message": format!(
                "Command timed out after {} seconds and was terminated.",
                after.as_secs()
            ),
            "stdout": output.stdout,
            "stderr": output.stderr,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{call, registry};
    use sdk::types::ToolStatus;
    use serde_json::json;

    #[tokio::test]
    async fn test_foreground_success_shape() {
        let (_temp, registry) = registry();

        let outcome = registry
            .dispatch(&call("Bash", json!({"command": "echo hi"})))
            .await;
        assert_eq!(outcome.status, ToolStatus::Success);
        assert_eq!(
            outcome.output,
            json!({"stdout": "hi\n", "stderr": "", "exitCode": 0})
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_error_with_output() {
        let (_temp, registry) = registry();

        let outcome = registry
            .dispatch(&call("Bash", json!({"command": "echo oops >&2; exit 2"})))
            .await;
        assert_eq!(outcome.status, ToolStatus::Error);
        assert_eq!(outcome.output["message"], json!("Command exited with code 2."));
        assert_eq!(outcome.output["stderr"], json!("oops\n"));
        assert_eq!(outcome.output["exitCode"], json!(2));
    }

    #[tokio::test]
    async fn test_timeout_is_flagged() {
        let (_temp, registry) = registry();

        let outcome = registry
            .dispatch(&call(
                "Bash",
                json!({"command": "echo started; sleep 10", "timeout": 1}),
            ))
            .await;
        assert_eq!(outcome.status, ToolStatus::Error);
        assert_eq!(outcome.output["status"], json!("timeout"));
        assert_eq!(
            outcome.output["message"],
            json!("Command timed out after 1 seconds and was terminated.")
        );
        assert_eq!(outcome.output["stdout"], json!("started\n"));
    }

    #[tokio::test]
    async fn test_background_reports_pid() {
        let (_temp, registry) = registry();

        let outcome = registry
            .dispatch(&call("Bash", json!({"command": "sleep 1", "background": true})))
            .await;
        assert_eq!(outcome.status, ToolStatus::Success);
        let pid = outcome.output["pid"].as_u64().unwrap();
        assert_eq!(
            outcome.output["stdout"],
            json!(format!(
                "Command 'sleep 1' initiated in background with PID: {}. Output is not captured.",
                pid
            ))
        );
        assert_eq!(outcome.output["stderr"], json!(""));
    }

    #[tokio::test]
    async fn test_missing_command() {
        let (_temp, registry) = registry();

        let outcome = registry.dispatch(&call("Bash", json!({}))).await;
        assert_eq!(
            outcome.output,
            json!("Bash error: \"command\" parameter is required")
        );
    }

    #[tokio::test]
    async fn test_timeout_out_of_range() {
        let (_temp, registry) = registry();

        let outcome = registry
            .dispatch(&call("Bash", json!({"command": "true", "timeout": 9000})))
            .await;
        assert_eq!(outcome.status, ToolStatus::Error);
    }
}
