//! Error types and handling
//!
//! This module provides the error types used throughout the Delve engine.
//! All errors implement the `ErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! Tool implementations never surface these errors to the conversation driver
//! directly. They are rendered into the error branch of a `ToolOutcome` so the
//! model can read them and self-correct.

use std::path::PathBuf;
use thiserror::Error;

/// Trait for Delve error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait ErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors are reported back to the model as tool errors and the
    /// conversation continues. Non-recoverable errors end the session.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration, missing credential
/// - **Sandbox**: Path traversal outside the project root
/// - **Tool invocation**: Missing or malformed parameters, unknown tools
/// - **File system**: Not found, wrong file type, generic I/O
/// - **Process**: Spawn failures
/// - **Network**: WebFetch failures
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ErrorExt};
///
/// let error = EngineError::MissingParameter("filePath".to_string());
/// assert_eq!(error.to_string(), "\"filePath\" parameter is required");
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::MissingCredential("CHUTES_API_KEY".to_string());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API credential not found. Set the {0} environment variable")]
    MissingCredential(String),

    // Sandbox errors
    #[error("Path traversal detected: {input} (resolves to {resolved:?}, outside of {root:?})")]
    PathTraversal {
        input: String,
        resolved: PathBuf,
        root: PathBuf,
    },

    #[error("Path canonicalization failed for {0:?}: {1}")]
    PathCanonicalization(PathBuf, String),

    // Tool invocation errors
    #[error("\"{0}\" parameter is required")]
    MissingParameter(String),

    #[error("Invalid parameter \"{name}\": {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Unknown tool '{name}'. Available tools: {available}")]
    ToolNotFound { name: String, available: String },

    #[error("Tool error: {0}")]
    ToolError(String),

    // File system errors
    #[error("File not found at '{0}'")]
    NotFound(String),

    #[error("Path '{0}' is a directory")]
    IsADirectory(String),

    #[error("Path '{0}' is not a directory")]
    NotADirectory(String),

    // Process errors
    #[error("Failed to spawn process: {0}")]
    ProcessSpawn(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Classify an I/O error against the path the caller asked for, so the
    /// model sees `not found` / `is a directory` instead of a raw OS message.
    pub fn from_io(err: std::io::Error, display_path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(display_path.to_string()),
            std::io::ErrorKind::IsADirectory => Self::IsADirectory(display_path.to_string()),
            std::io::ErrorKind::NotADirectory => Self::NotADirectory(display_path.to_string()),
            _ => Self::Io(err),
        }
    }
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::MissingCredential(_) => "Export the API key before starting a session",

            Self::PathTraversal { .. } => "Operation must stay within the project directory",
            Self::PathCanonicalization(_, _) => "Invalid path specified",

            Self::MissingParameter(_) | Self::InvalidParameter { .. } => {
                "Check the tool parameters and try again"
            }
            Self::ToolNotFound { .. } => "The requested tool is not available",
            Self::ToolError(_) => "Tool operation failed",

            Self::NotFound(_) => "The path does not exist",
            Self::IsADirectory(_) => "Expected a file but found a directory",
            Self::NotADirectory(_) => "Expected a directory but found a file",

            Self::ProcessSpawn(_) => "The shell could not be started",
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::MissingCredential(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traversal_message_shape() {
        let err = EngineError::PathTraversal {
            input: "../etc/passwd".to_string(),
            resolved: PathBuf::from("/etc/passwd"),
            root: PathBuf::from("/work"),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Path traversal detected: ../etc/passwd"));
        assert!(msg.contains("outside of"));
    }

    #[test]
    fn test_io_classification() {
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = EngineError::from_io(not_found, "missing.txt");
        assert!(matches!(err, EngineError::NotFound(ref p) if p == "missing.txt"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_directory_kinds_are_classified() {
        let dir = tempfile::TempDir::new().unwrap();

        let read_dir = std::fs::read_to_string(dir.path()).unwrap_err();
        assert!(matches!(
            EngineError::from_io(read_dir, "src"),
            EngineError::IsADirectory(ref p) if p == "src"
        ));

        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        let through_file = std::fs::read_to_string(file.join("inner")).unwrap_err();
        assert!(matches!(
            EngineError::from_io(through_file, "file.txt/inner"),
            EngineError::NotADirectory(_)
        ));
    }

    #[test]
    fn test_recoverability() {
        let unknown = EngineError::ToolNotFound {
            name: "Nope".into(),
            available: "Read, Write".into(),
        };
        assert!(unknown.is_recoverable());
        assert_eq!(
            unknown.to_string(),
            "Unknown tool 'Nope'. Available tools: Read, Write"
        );
        assert!(!EngineError::Config("bad".into()).is_recoverable());
    }
}
