//! Interactive session
//!
//! The REPL owns the single input handle. Confirmation prompts read from the
//! same `Prompter`, so there is never more than one reader on stdin.

use anyhow::Result;
use sdk::types::{ToolResult, ToolStatus};
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::commands::{CommandProcessor, CommandResult};
use super::driver::{ConversationDriver, TurnObserver};

/// Line-oriented access to the user's terminal
pub struct Prompter {
    input: Mutex<Box<dyn AsyncBufRead + Unpin + Send>>,
}

impl Prompter {
    pub fn new(input: impl AsyncBufRead + Unpin + Send + 'static) -> Self {
        Self {
            input: Mutex::new(Box::new(input)),
        }
    }

    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }

    /// Print without a trailing prompt
    pub fn say(&self, text: &str) {
        println!("{}", text);
    }

    /// Print `prompt` and read one line. `None` once input is closed.
    pub async fn ask(&self, prompt: &str) -> io::Result<Option<String>> {
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut line = String::new();
        let read = self.input.lock().await.read_line(&mut line).await?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Prints driver progress to stdout
pub struct TerminalObserver;

impl TurnObserver for TerminalObserver {
    fn on_model_call(&self, iteration: usize) {
        debug!("Waiting for model (iteration {})", iteration);
    }

    fn on_assistant_text(&self, text: &str) {
        println!("\nDelve: {}", text);
    }

    fn on_tool_result(&self, result: &ToolResult) {
        let mark = match result.status {
            ToolStatus::Success => "ok",
            ToolStatus::Error => "error",
        };
        println!("  [{}] {}", mark, result.tool_name);
    }

    fn on_plan_step(&self, index: usize, total: usize, description: &str) {
        println!("\n--- Step {}/{}: {}", index, total, description);
    }

    fn on_model_error(&self, message: &str) {
        println!("\n{}", message);
    }

    fn on_notice(&self, message: &str) {
        println!("\n{}", message);
    }
}

pub struct Session {
    driver: ConversationDriver,
    commands: CommandProcessor,
    prompter: std::sync::Arc<Prompter>,
}

impl Session {
    pub fn new(
        driver: ConversationDriver,
        commands: CommandProcessor,
        prompter: std::sync::Arc<Prompter>,
    ) -> Self {
        Self {
            driver,
            commands,
            prompter,
        }
    }

    /// Read requests until `exit`, `quit` or end of input
    pub async fn run(&mut self) -> Result<()> {
        self.prompter.say(&format!(
            "Delve ({}). Type /help for commands, exit to quit.",
            self.driver.model()
        ));

        loop {
            let Some(line) = self.prompter.ask("\nYou: ").await? else {
                info!("Input closed, ending session");
                break;
            };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
                info!("Session ended by user");
                break;
            }

            let request = match self.commands.process(input) {
                CommandResult::ClientHandled(text) => {
                    self.prompter.say(&text);
                    continue;
                }
                CommandResult::LlmPrompt(prompt) => prompt,
                CommandResult::NoCommand(text) => text,
                CommandResult::Unknown(name) => {
                    debug!("Unknown command '/{}', sending as-is", name);
                    input.to_string()
                }
            };

            let report = self.driver.handle_user_input(&request).await;
            debug!("Turn report: {:?}", report);
        }

        Ok(())
    }
}
