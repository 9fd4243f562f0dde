//! Delve SDK
//!
//! Shared library providing the error taxonomy and the tool-call wire types.
//! This crate is used by the engine and by its integration tests.

/// Error types and handling
pub mod errors;

/// Tool call / tool result types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, ErrorExt};
pub use types::{Parameters, Plan, ToolCall, ToolOutcome, ToolResponses, ToolResult, ToolStatus};
