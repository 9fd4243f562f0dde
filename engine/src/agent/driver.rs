//! Conversation driver
//!
//! Runs one user request to completion:
//!
//! 1. Append the user message and call the model with the full history.
//! 2. Strip thinking blocks, store the reply, and extract tool calls and an
//!    optional plan.
//! 3. Execute every tool call in order (after confirmation) and append all
//!    results as one `tool_responses` message.
//! 4. Repeat until the model answers without tool calls.
//!
//! The loop is bounded: after `max_iterations` model calls a directive asks
//! the model to wrap up, and it gets exactly one more call. Tool calls in that
//! last reply are not executed.
//!
//! A plan captured during the request is driven afterwards, one step at a
//! time. Each step runs the same bounded loop and ends when the model replies
//! with `TASK COMPLETE`.

use sdk::types::{Plan, ToolOutcome, ToolResponses, ToolResult};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::confirm::ConfirmationGate;
use super::history::ConversationHistory;
use crate::config::AgentConfig;
use crate::llm::{LLMProvider, Message};
use crate::protocol::{self, ParsedCall};
use crate::secrets::scrub;
use crate::tools::ToolRegistry;

/// Token the model uses to confirm a plan step
pub const TASK_COMPLETE: &str = "TASK COMPLETE";

/// Injected once the iteration ceiling is reached
pub const ITERATION_LIMIT_DIRECTIVE: &str = "TOOL_EXECUTION_ERROR: Max tool iterations reached. Please summarize your current state or ask the user for guidance.";

/// Output of a call the user refused
pub const DENIED_OUTPUT: &str = "User denied tool execution";

/// Summary of one handled request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnReport {
    /// Model calls made, plan steps included
    pub iterations: usize,
    /// Tool calls handled, malformed and denied ones included
    pub tool_calls: usize,
    pub plan_steps_completed: usize,
    /// The request ended on a model error
    pub errored: bool,
    /// Last non-empty text shown to the user
    pub final_text: String,
}

/// Receives progress while a request runs. Every method defaults to a no-op.
pub trait TurnObserver: Send + Sync {
    fn on_model_call(&self, _iteration: usize) {}
    fn on_assistant_text(&self, _text: &str) {}
    fn on_tool_result(&self, _result: &ToolResult) {}
    fn on_plan_step(&self, _index: usize, _total: usize, _description: &str) {}
    fn on_model_error(&self, _message: &str) {}
    fn on_notice(&self, _message: &str) {}
}

/// Observer that ignores everything
pub struct SilentObserver;

impl TurnObserver for SilentObserver {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Goal {
    Reply,
    Step { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopEnd {
    /// The model answered without tool calls
    Answered,
    /// The model confirmed the current plan step
    StepConfirmed,
    /// The iteration ceiling ran out
    Exhausted,
    ModelError,
}

pub struct ConversationDriver {
    provider: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    gate: Arc<dyn ConfirmationGate>,
    observer: Arc<dyn TurnObserver>,
    history: ConversationHistory,
    model: String,
    max_iterations: usize,
}

impl ConversationDriver {
    /// The history starts with the registry's system prompt
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: Arc<ToolRegistry>,
        gate: Arc<dyn ConfirmationGate>,
        config: &AgentConfig,
        model: impl Into<String>,
    ) -> Self {
        let history = ConversationHistory::new(tools.system_prompt());
        Self {
            provider,
            tools,
            gate,
            observer: Arc::new(SilentObserver),
            history,
            model: model.into(),
            max_iterations: config.max_iterations.max(1),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn history(&self) -> &[Message] {
        self.history.messages()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Handle one user request, plan included. Never fails: model errors are
    /// recorded in the history and reported through `TurnReport::errored`.
    pub async fn handle_user_input(&mut self, input: &str) -> TurnReport {
        let request_id = Uuid::new_v4();
        info!("Request {}: {} chars", request_id, input.len());
        self.history.push(Message::user(input));

        let mut report = TurnReport::default();
        let mut plan = None;

        match self.run_loop(Goal::Reply, &mut plan, &mut report).await {
            LoopEnd::Answered => {
                if let Some(plan) = plan {
                    self.run_plan(plan, &mut report).await;
                }
            }
            LoopEnd::ModelError => report.errored = true,
            LoopEnd::Exhausted | LoopEnd::StepConfirmed => {
                if plan.is_some() {
                    warn!("Skipping plan: iteration limit reached before it could start");
                }
            }
        }

        info!(
            "Request {} finished: {} model calls, {} tool calls, {} plan steps, errored: {}",
            request_id,
            report.iterations, report.tool_calls, report.plan_steps_completed, report.errored
        );
        debug!(
            "History holds {} messages (~{} tokens)",
            self.history.messages().len(),
            self.history.estimated_tokens()
        );
        report
    }

    async fn run_plan(&mut self, plan: Plan, report: &mut TurnReport) {
        let total = plan.len();
        info!("Executing plan with {} steps", total);

        for (i, description) in plan.steps.iter().enumerate() {
            let index = i + 1;
            info!("Plan step {}/{}: {}", index, total, description);
            self.observer.on_plan_step(index, total, description);
            self.history.push(Message::user(format!(
                "Now complete step {} of {}: \"{}\". Use tools as needed. When this step is done, reply with {}.",
                index, total, description, TASK_COMPLETE
            )));

            match self.run_loop(Goal::Step { index }, &mut None, report).await {
                LoopEnd::StepConfirmed => {
                    report.plan_steps_completed += 1;
                    debug!("Plan step {} confirmed", index);
                }
                LoopEnd::ModelError => {
                    report.errored = true;
                    warn!("Aborting plan at step {}: model error", index);
                    return;
                }
                LoopEnd::Exhausted | LoopEnd::Answered => {
                    warn!("Aborting plan: step {} was never confirmed", index);
                    self.observer.on_notice(&format!(
                        "Plan stopped: step {} of {} was not completed.",
                        index, total
                    ));
                    return;
                }
            }
        }

        info!("Plan completed");
    }

    /// The bounded model/tool cycle shared by the request and each plan step.
    /// `plan` captures the first plan seen while answering the request.
    async fn run_loop(
        &mut self,
        goal: Goal,
        plan: &mut Option<Plan>,
        report: &mut TurnReport,
    ) -> LoopEnd {
        let mut iterations = 0;

        loop {
            if iterations == self.max_iterations {
                warn!("Max tool iterations ({}) reached", self.max_iterations);
                self.history.push(Message::user(ITERATION_LIMIT_DIRECTIVE));
            }
            iterations += 1;
            report.iterations += 1;
            let final_call = iterations > self.max_iterations;

            debug!("Model call {} ({:?})", iterations, goal);
            self.observer.on_model_call(iterations);

            let reply = match self.provider.generate(self.history.messages(), &self.model).await {
                Ok(reply) => reply,
                Err(e) => {
                    let message = scrub(&format!("LLM Communication Error: {}", e));
                    error!("{}", message);
                    self.history.push(Message::assistant(message.clone()));
                    self.observer.on_model_error(&message);
                    return LoopEnd::ModelError;
                }
            };

            let (content, thoughts) = protocol::strip_thinking(&reply.content);
            for thought in &thoughts {
                debug!("Model reasoning: {}", thought.trim());
            }
            self.history.push(Message::assistant(content.clone()));

            let mut parsed = protocol::extract(&content);
            if goal == Goal::Reply && plan.is_none() {
                if let Some(captured) = parsed.plan.take() {
                    info!("Captured plan with {} steps", captured.len());
                    *plan = Some(captured);
                }
            }

            if !parsed.text.is_empty() {
                self.observer.on_assistant_text(&parsed.text);
                report.final_text = parsed.text.clone();
            }

            // Only prose outside tool call and plan blocks counts as confirmation
            let confirmed =
                matches!(goal, Goal::Step { .. }) && parsed.text.contains(TASK_COMPLETE);

            if parsed.has_calls() {
                if final_call {
                    warn!(
                        "Not executing {} tool calls past the iteration limit",
                        parsed.calls.len()
                    );
                    self.observer.on_notice(
                        "Max tool iterations reached. Remaining tool calls were not executed.",
                    );
                    return if confirmed {
                        LoopEnd::StepConfirmed
                    } else {
                        LoopEnd::Exhausted
                    };
                }

                self.execute_calls(parsed.calls, report).await;
                if confirmed {
                    return LoopEnd::StepConfirmed;
                }
                continue;
            }

            match goal {
                Goal::Reply => return LoopEnd::Answered,
                Goal::Step { .. } if confirmed => return LoopEnd::StepConfirmed,
                Goal::Step { .. } if final_call => return LoopEnd::Exhausted,
                Goal::Step { index } => {
                    debug!("Step {} not confirmed, reminding model", index);
                    self.history.push(Message::user(format!(
                        "Step {} is not confirmed yet. Continue working on it, or reply with {} if it is done.",
                        index, TASK_COMPLETE
                    )));
                }
            }
        }
    }

    /// Run calls in order and append their results as one message
    async fn execute_calls(&mut self, calls: Vec<ParsedCall>, report: &mut TurnReport) {
        let mut results = Vec::with_capacity(calls.len());

        for parsed in calls {
            report.tool_calls += 1;
            let result = match parsed {
                ParsedCall::Malformed { error, raw } => {
                    warn!("Reporting malformed tool call: {}", error);
                    ParsedCall::malformed_result(&error, &raw)
                }
                ParsedCall::Valid(call) => {
                    let params = Value::Object(call.parameters.clone());
                    info!("Tool call: {} {}", call.name, params);

                    if self.gate.confirm(&call).await {
                        let outcome = self.tools.dispatch(&call).await;
                        ToolResult::new(call.name, params, outcome)
                    } else {
                        warn!("User denied {}", call.name);
                        ToolResult::new(call.name, params, ToolOutcome::error(DENIED_OUTPUT))
                    }
                }
            };

            debug!("{} finished with {:?}", result.tool_name, result.status);
            self.observer.on_tool_result(&result);
            results.push(result);
        }

        let body = ToolResponses {
            tool_responses: results,
        };
        let content = match serde_json::to_string(&body) {
            Ok(content) => content,
            Err(e) => {
                error!("Failed to serialize tool responses: {}", e);
                format!(
                    r#"{{"tool_responses": [], "error": "Failed to serialize tool responses: {}"}}"#,
                    e
                )
            }
        };
        self.history.push(Message::user(content));
    }
}
