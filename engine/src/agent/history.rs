//! Conversation history
//!
//! An append-only list of messages whose first entry is always the system
//! prompt. The whole list is sent with every model call.

use crate::llm::{Message, MessageRole};

/// Average characters per token, for log estimates only
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    /// Start a history with the system prompt
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Append a message. A system message past the first position is stored
    /// as a user message so the invariant on the first entry holds.
    pub fn push(&mut self, message: Message) {
        let message = if message.role == MessageRole::System {
            Message::user(message.content)
        } else {
            message
        };
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Rough token count of the whole history
    pub fn estimated_tokens(&self) -> usize {
        self.messages
            .iter()
            .map(|m| m.content.len().div_ceil(CHARS_PER_TOKEN))
            .sum()
    }
}
