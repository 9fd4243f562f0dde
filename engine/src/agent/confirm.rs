//! Tool-call confirmation
//!
//! Every tool call the model requests passes through a `ConfirmationGate`
//! before it runs. The terminal gate asks the user on the session's input
//! handle; `AutoApprove` answers yes to everything.

use async_trait::async_trait;
use sdk::types::ToolCall;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::session::Prompter;

#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    /// `true` when the call may run
    async fn confirm(&self, call: &ToolCall) -> bool;
}

/// Approves every call without asking
pub struct AutoApprove;

#[async_trait]
impl ConfirmationGate for AutoApprove {
    async fn confirm(&self, call: &ToolCall) -> bool {
        debug!("Auto-approving {}", call.name);
        true
    }
}

/// Asks y/N on the interactive session before each call
pub struct TerminalConfirm {
    prompter: Arc<Prompter>,
}

impl TerminalConfirm {
    pub fn new(prompter: Arc<Prompter>) -> Self {
        Self { prompter }
    }
}

#[async_trait]
impl ConfirmationGate for TerminalConfirm {
    async fn confirm(&self, call: &ToolCall) -> bool {
        let params = serde_json::to_string_pretty(&Value::Object(call.parameters.clone()))
            .unwrap_or_else(|_| "{}".to_string());
        self.prompter
            .say(&format!("\nTool request: {}\n{}", call.name, params));

        match self.prompter.ask("Execute this tool? (y/N) ").await {
            Ok(Some(answer)) => is_yes(&answer),
            Ok(None) => {
                warn!("Input closed while confirming {}", call.name);
                false
            }
            Err(e) => {
                warn!("Failed to read confirmation: {}", e);
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn call() -> ToolCall {
        ToolCall::new("LS", Map::new())
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES \n"));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
        assert!(!is_yes("yep"));
    }

    #[tokio::test]
    async fn test_terminal_gate_reads_answers_in_order() {
        let prompter = Arc::new(Prompter::new(&b"y\nn\n"[..]));
        let gate = TerminalConfirm::new(prompter);

        assert!(gate.confirm(&call()).await);
        assert!(!gate.confirm(&call()).await);
        // input exhausted
        assert!(!gate.confirm(&call()).await);
    }

    #[tokio::test]
    async fn test_auto_approve() {
        assert!(AutoApprove.confirm(&call()).await);
    }
}
