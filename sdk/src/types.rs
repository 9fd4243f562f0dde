//! Tool call and tool result wire types
//!
//! These are the shapes exchanged with the model: a `ToolCall` is extracted
//! from the model's text, a `ToolResult` is what goes back inside the
//! `{"tool_responses": [...]}` message.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::EngineError;

/// Tool parameters as sent by the model
pub type Parameters = Map<String, Value>;

/// A structured tool invocation extracted from model text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to call
    pub name: String,

    /// Tool-specific parameters
    pub parameters: Parameters,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    /// Get a required string parameter
    pub fn param_str(&self, key: &str) -> Result<&str, EngineError> {
        param_str(&self.parameters, key)
    }
}

/// Outcome of a single tool execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// What a tool implementation returns: a status and an arbitrary JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub status: ToolStatus,
    pub output: Value,
}

impl ToolOutcome {
    /// Create a successful outcome with a JSON payload
    pub fn success(output: impl Into<Value>) -> Self {
        Self {
            status: ToolStatus::Success,
            output: output.into(),
        }
    }

    /// Create an error outcome with a JSON payload
    pub fn error(output: impl Into<Value>) -> Self {
        Self {
            status: ToolStatus::Error,
            output: output.into(),
        }
    }

    /// Render an engine error as a human-readable error outcome
    pub fn from_error(tool: &str, err: &EngineError) -> Self {
        Self::error(format!("{} error: {}", tool, err))
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// One entry of the `tool_responses` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub parameters: Value,
    pub status: ToolStatus,
    pub output: Value,
}

impl ToolResult {
    /// Attach the invocation that produced an outcome
    pub fn new(tool_name: impl Into<String>, parameters: Value, outcome: ToolOutcome) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
            status: outcome.status,
            output: outcome.output,
        }
    }
}

/// The single synthetic message body carrying all results of one model turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponses {
    pub tool_responses: Vec<ToolResult>,
}

/// An ordered list of step descriptions proposed by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    pub steps: Vec<String>,
}

impl Plan {
    pub fn new(steps: Vec<String>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Get a required string parameter
pub fn param_str<'a>(params: &'a Parameters, key: &str) -> Result<&'a str, EngineError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| EngineError::MissingParameter(key.to_string()))
}

/// Get an optional string parameter
pub fn param_str_opt<'a>(params: &'a Parameters, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Get an optional bool parameter
pub fn param_bool_opt(params: &Parameters, key: &str) -> Option<bool> {
    params.get(key).and_then(|v| v.as_bool())
}

/// Get an optional integer parameter, accepting numeric strings
pub fn param_i64_opt(params: &Parameters, key: &str) -> Result<Option<i64>, EngineError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| invalid(key, "not an integer")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(key, "not an integer")),
        Some(_) => Err(invalid(key, "not an integer")),
    }
}

/// Get a required integer parameter
pub fn param_i64(params: &Parameters, key: &str) -> Result<i64, EngineError> {
    param_i64_opt(params, key)?.ok_or_else(|| EngineError::MissingParameter(key.to_string()))
}

/// Get an optional list of strings
pub fn param_str_list(params: &Parameters, key: &str) -> Result<Vec<String>, EngineError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(String::from)
                    .ok_or_else(|| invalid(key, "expected an array of strings"))
            })
            .collect(),
        Some(_) => Err(invalid(key, "expected an array of strings")),
    }
}

fn invalid(key: &str, reason: &str) -> EngineError {
    EngineError::InvalidParameter {
        name: key.to_string(),
        reason: reason.to_string(),
    }
}
