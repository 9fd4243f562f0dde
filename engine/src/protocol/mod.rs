//! Tool-call protocol
//!
//! Extracts structured requests from free-form model text:
//!
//! - at most one `<plan>[...]</plan>` block holding a JSON array of step
//!   descriptions, removed first;
//! - any number of `<tool_call>{"name": ..., "parameters": {...}}</tool_call>`
//!   blocks, in order of appearance;
//! - the residual text, trimmed, which is what the user sees.
//!
//! Malformed blocks never abort extraction. They become
//! `ParsedCall::Malformed` entries that are reported back to the model as
//! tool errors.

use regex::Regex;
use sdk::types::{Plan, ToolCall, ToolOutcome, ToolResult};
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Tool name under which malformed calls are reported back
pub const INVALID_TOOL_CALL: &str = "InvalidToolCall";

static PLAN_BLOCK: OnceLock<Regex> = OnceLock::new();
static TOOL_CALL_BLOCK: OnceLock<Regex> = OnceLock::new();
static THINK_BLOCK: OnceLock<Regex> = OnceLock::new();

fn plan_block() -> &'static Regex {
    PLAN_BLOCK.get_or_init(|| Regex::new(r"(?s)<plan>(.*?)</plan>").expect("Invalid plan pattern"))
}

fn tool_call_block() -> &'static Regex {
    TOOL_CALL_BLOCK.get_or_init(|| {
        Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").expect("Invalid tool_call pattern")
    })
}

fn think_block() -> &'static Regex {
    THINK_BLOCK
        .get_or_init(|| Regex::new(r"<think>[\s\S]*?</think>\n?").expect("Invalid think pattern"))
}

/// One extracted tool-call block
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedCall {
    Valid(ToolCall),
    Malformed { error: String, raw: String },
}

impl ParsedCall {
    /// The result reported for a malformed call without executing anything
    pub fn malformed_result(error: &str, raw: &str) -> ToolResult {
        ToolResult::new(
            INVALID_TOOL_CALL,
            json!({ "raw": raw }),
            ToolOutcome::error(error.to_string()),
        )
    }
}

/// Everything extracted from one model reply
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub calls: Vec<ParsedCall>,
    pub plan: Option<Plan>,
    pub text: String,
}

impl ParsedReply {
    pub fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }
}

/// Remove `<think>` blocks (and one trailing newline each), returning the
/// cleaned text and the removed reasoning.
pub fn strip_thinking(text: &str) -> (String, Vec<String>) {
    let thoughts: Vec<String> = think_block()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    if thoughts.is_empty() {
        return (text.trim().to_string(), thoughts);
    }
    let cleaned = think_block().replace_all(text, "").trim().to_string();
    (cleaned, thoughts)
}

/// Extract plan, tool calls and residual text from a model reply.
///
/// Stateless: every call starts a fresh scan, so the same input always
/// yields the same result.
pub fn extract(text: &str) -> ParsedReply {
    let plan = plan_block()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_plan(m.as_str()));
    let without_plan = plan_block().replace_all(text, "");

    let calls: Vec<ParsedCall> = tool_call_block()
        .captures_iter(&without_plan)
        .filter_map(|caps| caps.get(1))
        .map(|m| parse_call(m.as_str().trim()))
        .collect();
    let residual = tool_call_block().replace_all(&without_plan, "");

    debug!(
        "Extracted {} tool calls, plan: {}",
        calls.len(),
        plan.as_ref().map_or(0, Plan::len)
    );

    ParsedReply {
        calls,
        plan,
        text: residual.trim().to_string(),
    }
}

fn parse_plan(raw: &str) -> Option<Plan> {
    match serde_json::from_str::<Vec<String>>(raw.trim()) {
        Ok(steps) if !steps.is_empty() => Some(Plan::new(steps)),
        Ok(_) => None,
        Err(e) => {
            warn!("Ignoring malformed plan block: {}", e);
            None
        }
    }
}

fn parse_call(raw: &str) -> ParsedCall {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("Invalid JSON in tool_call: {}", raw);
            return ParsedCall::Malformed {
                error: format!("Invalid JSON in tool_call: {}", e),
                raw: raw.to_string(),
            };
        }
    };

    let name = value
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty());
    let parameters = value.get("parameters").and_then(Value::as_object);

    match (name, parameters) {
        (Some(name), Some(parameters)) => {
            ParsedCall::Valid(ToolCall::new(name, parameters.clone()))
        }
        _ => {
            warn!("Malformed tool call (missing name or parameters): {}", raw);
            ParsedCall::Malformed {
                error: "Malformed tool call: missing name or parameters.".to_string(),
                raw: raw.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        let reply = extract("  Just an answer.  ");
        assert!(reply.calls.is_empty());
        assert_eq!(reply.plan, None);
        assert_eq!(reply.text, "Just an answer.");
    }

    #[test]
    fn test_single_call_and_residual() {
        let reply = extract(
            r#"<tool_call>{"name":"Read","parameters":{"filePath":"a.txt"}}</tool_call>Hello"#,
        );
        assert_eq!(reply.text, "Hello");
        match &reply.calls[..] {
            [ParsedCall::Valid(call)] => {
                assert_eq!(call.name, "Read");
                assert_eq!(call.param_str("filePath").unwrap(), "a.txt");
            }
            other => panic!("unexpected calls: {:?}", other),
        }
    }

    #[test]
    fn test_multiple_calls_keep_order() {
        let reply = extract(
            "First\n<tool_call>\n{\"name\":\"LS\",\"parameters\":{}}\n</tool_call>\nthen\n<tool_call>{\"name\":\"Read\",\"parameters\":{\"filePath\":\"b\"}}</tool_call>",
        );
        let names: Vec<_> = reply
            .calls
            .iter()
            .map(|c| match c {
                ParsedCall::Valid(call) => call.name.as_str(),
                ParsedCall::Malformed { .. } => "?",
            })
            .collect();
        assert_eq!(names, vec!["LS", "Read"]);
        assert_eq!(reply.text, "First\n\nthen");
    }

    #[test]
    fn test_invalid_json_is_reported_not_thrown() {
        let reply = extract("<tool_call>{not json}</tool_call>");
        match &reply.calls[..] {
            [ParsedCall::Malformed { error, raw }] => {
                assert!(error.starts_with("Invalid JSON in tool_call:"));
                assert_eq!(raw, "{not json}");
            }
            other => panic!("unexpected calls: {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let reply = extract(r#"<tool_call>{"name":"Read"}</tool_call>"#);
        assert_eq!(
            reply.calls,
            vec![ParsedCall::Malformed {
                error: "Malformed tool call: missing name or parameters.".to_string(),
                raw: r#"{"name":"Read"}"#.to_string(),
            }]
        );
    }

    #[test]
    fn test_plan_is_extracted_first() {
        let reply = extract(
            r#"Here is the plan.
<plan>["step A", "step B"]</plan>
<tool_call>{"name":"LS","parameters":{}}</tool_call>"#,
        );
        assert_eq!(
            reply.plan,
            Some(Plan::new(vec!["step A".to_string(), "step B".to_string()]))
        );
        assert_eq!(reply.calls.len(), 1);
        assert_eq!(reply.text, "Here is the plan.");
    }

    #[test]
    fn test_tool_call_inside_plan_is_not_extracted() {
        let reply = extract(
            r#"<plan>["use <tool_call>{\"name\":\"LS\",\"parameters\":{}}</tool_call>"]</plan>"#,
        );
        assert!(reply.calls.is_empty());
        assert!(reply.plan.is_some());
    }

    #[test]
    fn test_malformed_plan_is_ignored() {
        let reply = extract("<plan>not a list</plan>done");
        assert_eq!(reply.plan, None);
        assert_eq!(reply.text, "done");
    }

    #[test]
    fn test_strip_thinking() {
        let (text, thoughts) = strip_thinking("<think>\nhmm\n</think>\nAnswer <think>x</think>here");
        assert_eq!(text, "Answer here");
        assert_eq!(thoughts.len(), 2);

        let (text, thoughts) = strip_thinking(" plain ");
        assert_eq!(text, "plain");
        assert!(thoughts.is_empty());
    }

    #[test]
    fn test_malformed_result_shape() {
        let result = ParsedCall::malformed_result("Malformed tool call: missing name or parameters.", "{}");
        assert_eq!(result.tool_name, INVALID_TOOL_CALL);
        assert_eq!(result.parameters, json!({"raw": "{}"}));
    }
}
