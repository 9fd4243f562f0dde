//! Delve Engine Library
//!
//! This library provides the core functionality of the Delve assistant.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// File system security module
pub mod fs_guard;

/// Shell process execution module
pub mod process;

/// Tool-call extraction from model text
pub mod protocol;

/// LLM provider abstraction layer
pub mod llm;

/// Conversation driver and interactive session
pub mod agent;

/// Built-in tools
pub mod tools;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
