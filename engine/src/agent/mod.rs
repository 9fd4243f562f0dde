//! Conversation agent
//!
//! The driver runs the bounded model/tool cycle over an append-only history.
//! The session wraps it in a terminal REPL with slash commands and
//! per-call confirmation.

pub mod commands;
pub mod confirm;
pub mod driver;
pub mod history;
pub mod session;

pub use commands::{CommandDefinition, CommandProcessor, CommandResult};
pub use confirm::{AutoApprove, ConfirmationGate, TerminalConfirm};
pub use driver::{
    ConversationDriver, SilentObserver, TurnObserver, TurnReport, DENIED_OUTPUT,
    ITERATION_LIMIT_DIRECTIVE, TASK_COMPLETE,
};
pub use history::ConversationHistory;
pub use session::{Prompter, Session, TerminalObserver};
