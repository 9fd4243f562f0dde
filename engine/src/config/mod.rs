//! Configuration management
//!
//! This module handles loading, validation, and management of the Delve configuration.
//! Configuration is stored in TOML format at ~/.delve/config.toml. The file is
//! optional: every section and field has a default, so a partial file (or no
//! file at all) yields a working configuration.
//!
//! # Configuration Sections
//!
//! - **core**: Project path, log level
//! - **llm**: Model endpoint, model name, credential variable, sampling
//! - **agent**: Iteration ceiling, auto-approval, slash command file
//! - **tools**: Timeouts and limits for the built-in tools
//!
//! # Precedence
//!
//! Command-line flags override file values, which override defaults.
//!
//! # Path Expansion
//!
//! The configuration system automatically:
//! - Expands ~ to the user's home directory
//! - Canonicalizes the project path to resolve symlinks and .. patterns
//! - Verifies the project path is an existing directory
//!
//! # Examples
//!
//! ```no_run
//! use delve_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::load(None)?;
//! config.validate_and_process()?;
//!
//! println!("Project: {:?}", config.core.project_path);
//! println!("Model: {}", config.llm.model);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Model endpoint configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Conversation driver settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Built-in tool limits
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Project directory the tools are confined to (supports ~ expansion)
    #[serde(default = "default_project_path")]
    pub project_path: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Conversation driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model calls per request before the soft-stop directive is injected
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Execute tool calls without asking for confirmation
    #[serde(default)]
    pub auto_approve: bool,

    /// Optional JSON file with slash command definitions
    #[serde(default)]
    pub commands_file: Option<PathBuf>,
}

/// Built-in tool limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Default foreground timeout for Bash
    #[serde(default = "default_bash_timeout_secs")]
    pub bash_timeout_secs: u64,

    /// Request timeout for WebFetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Characters of fetched content kept before truncation
    #[serde(default = "default_fetch_max_chars")]
    pub fetch_max_chars: usize,

    /// Tree depth when the call does not specify one
    #[serde(default = "default_tree_default_depth")]
    pub tree_default_depth: usize,

    /// Largest depth Tree accepts
    #[serde(default = "default_tree_max_depth")]
    pub tree_max_depth: usize,
}

impl ToolsConfig {
    pub fn bash_timeout(&self) -> Duration {
        Duration::from_secs(self.bash_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub project_path: Option<PathBuf>,
    pub model: Option<String>,
    pub auto_approve: bool,
    pub log_level: Option<String>,
}

fn default_project_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://llm.chutes.ai/v1".to_string()
}

fn default_model() -> String {
    "deepseek-ai/DeepSeek-V3-0324".to_string()
}

fn default_api_key_env() -> String {
    "CHUTES_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_max_iterations() -> usize {
    70
}

fn default_bash_timeout_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

fn default_fetch_max_chars() -> usize {
    5000
}

fn default_tree_default_depth() -> usize {
    3
}

fn default_tree_max_depth() -> usize {
    10
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            project_path: default_project_path(),
            log_level: default_log_level(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            auto_approve: false,
            commands_file: None,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            bash_timeout_secs: default_bash_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fetch_max_chars: default_fetch_max_chars(),
            tree_default_depth: default_tree_default_depth(),
            tree_max_depth: default_tree_max_depth(),
        }
    }
}

impl Config {
    /// Load configuration without validating it
    ///
    /// An explicit path must exist. Without one, ~/.delve/config.toml is read
    /// if present and defaults are used otherwise. Nothing is written to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - An explicit configuration file cannot be read
    /// - TOML parsing fails
    pub fn load(explicit: Option<&Path>) -> Result<Self, EngineError> {
        match explicit {
            Some(path) => Self::parse_file(path),
            None => {
                let path = Self::default_config_path()?;
                if path.exists() {
                    Self::parse_file(&path)
                } else {
                    debug!("No config file at {:?}, using defaults", path);
                    Ok(Self::default())
                }
            }
        }
    }

    fn parse_file(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default configuration file path (~/.delve/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".delve").join("config.toml"))
    }

    /// Apply command-line values on top of the file configuration
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(path) = overrides.project_path {
            self.core.project_path = path;
        }
        if let Some(model) = overrides.model {
            self.llm.model = model;
        }
        if overrides.auto_approve {
            self.agent.auto_approve = true;
        }
        if let Some(level) = overrides.log_level {
            self.core.log_level = level;
        }
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates the log level, iteration ceiling and tool limits
    /// - Expands ~ in paths
    /// - Canonicalizes the project path
    /// - Verifies the project path is a directory
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` or `EngineError::PathCanonicalization`
    /// describing the first invalid value.
    pub fn validate_and_process(&mut self) -> Result<(), EngineError> {
        // Validate log level
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.agent.max_iterations == 0 {
            return Err(EngineError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        // Validate tree depths
        let depths = 1..=10;
        if !depths.contains(&self.tools.tree_max_depth) {
            return Err(EngineError::Config(
                "tree_max_depth must be between 1 and 10".to_string(),
            ));
        }
        if !(1..=self.tools.tree_max_depth).contains(&self.tools.tree_default_depth) {
            return Err(EngineError::Config(format!(
                "tree_default_depth must be between 1 and {}",
                self.tools.tree_max_depth
            )));
        }

        if self.tools.bash_timeout_secs == 0 || self.tools.fetch_timeout_secs == 0 {
            return Err(EngineError::Config(
                "Tool timeouts must be at least one second".to_string(),
            ));
        }

        if self.llm.api_key_env.trim().is_empty() {
            return Err(EngineError::Config("api_key_env must not be empty".to_string()));
        }

        // Expand and validate project path
        let expanded = expand_path(&self.core.project_path)?;
        self.core.project_path = expanded
            .canonicalize()
            .map_err(|e| EngineError::PathCanonicalization(expanded.clone(), e.to_string()))?;

        if !self.core.project_path.is_dir() {
            return Err(EngineError::Config(format!(
                "Project path is not a directory: {:?}",
                self.core.project_path
            )));
        }

        if let Some(ref file) = self.agent.commands_file {
            self.agent.commands_file = Some(expand_path(file)?);
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
///
/// # Examples
///
/// ```ignore
/// let path = PathBuf::from("~/projects");
/// let expanded = expand_path(&path)?;
/// // expanded is now /home/user/projects (on Unix)
/// ```
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
