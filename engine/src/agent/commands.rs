//! Slash commands
//!
//! Lines starting with `/` are looked up in a command table before they reach
//! the model. `/help` is built in; other commands come from an optional JSON
//! file mapping a name to a prompt template:
//!
//! ```json
//! {
//!   "review": {
//!     "description": "Review a file",
//!     "prompt_template": "Review {file} for bugs.",
//!     "arg_placeholder": "{file}"
//!   }
//! }
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

const HELP: &str = "help";

/// A command loaded from the commands file
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CommandDefinition {
    #[serde(default)]
    pub description: String,

    pub prompt_template: String,

    /// Token in the template replaced by the command arguments
    #[serde(default)]
    pub arg_placeholder: Option<String>,
}

/// What to do with one line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Not a command; send to the model unchanged
    NoCommand(String),
    /// Handled locally; print this text
    ClientHandled(String),
    /// Expanded template to send to the model
    LlmPrompt(String),
    /// `/name` with no matching command
    Unknown(String),
}

#[derive(Debug, Default)]
pub struct CommandProcessor {
    commands: BTreeMap<String, CommandDefinition>,
}

impl CommandProcessor {
    pub fn new(commands: BTreeMap<String, CommandDefinition>) -> Self {
        let commands = commands
            .into_iter()
            .filter(|(name, _)| {
                if name == HELP {
                    warn!("Ignoring user command '/help': the name is built in");
                }
                name != HELP
            })
            .collect();
        Self { commands }
    }

    /// Load commands from a JSON file. A missing or invalid file leaves only
    /// the built-in commands.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read commands file {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<BTreeMap<String, CommandDefinition>>(&content) {
            Ok(commands) => {
                info!("Loaded {} commands from {}", commands.len(), path.display());
                Self::new(commands)
            }
            Err(e) => {
                warn!("Invalid commands file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn process(&self, input: &str) -> CommandResult {
        let trimmed = input.trim();
        let Some(body) = trimmed.strip_prefix('/') else {
            return CommandResult::NoCommand(input.to_string());
        };

        let (name, args) = match body.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (body, ""),
        };
        debug!("Slash command '{}' with args '{}'", name, args);

        if name == HELP {
            return CommandResult::ClientHandled(self.help_text());
        }

        match self.commands.get(name) {
            Some(command) => CommandResult::LlmPrompt(expand(command, args)),
            None => CommandResult::Unknown(name.to_string()),
        }
    }

    pub fn help_text(&self) -> String {
        let mut text = String::from("Available commands:\n  /help - Show this help message");
        for (name, command) in &self.commands {
            text.push_str(&format!("\n  /{} - {}", name, command.description));
        }
        text.push_str("\n  exit, quit - End the session");
        text
    }
}

fn expand(command: &CommandDefinition, args: &str) -> String {
    match &command.arg_placeholder {
        Some(placeholder) if !placeholder.is_empty() => {
            command.prompt_template.replace(placeholder.as_str(), args)
        }
        _ if args.is_empty() => command.prompt_template.clone(),
        _ => format!("{}\n\n{}", command.prompt_template, args),
    }
}
