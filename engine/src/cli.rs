//! CLI interface for Delve
//!
//! Flags only: running the binary starts an interactive session in the
//! project directory.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Overrides;

/// Delve
///
/// A terminal assistant that lets a language model read, search and change
/// files in one project directory and run commands there.
#[derive(Parser, Debug)]
#[command(name = "delve")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Project directory the tools are confined to
    #[arg(short = 'p', long, value_name = "DIR")]
    pub project_path: Option<PathBuf>,

    /// Model identifier sent to the endpoint
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Run tool calls without asking for confirmation
    #[arg(short, long)]
    pub brave: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Values that take precedence over the configuration file
    pub fn overrides(&self) -> Overrides {
        Overrides {
            project_path: self.project_path.clone(),
            model: self.model.clone(),
            auto_approve: self.brave,
            log_level: self.log.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from(["delve", "-p", "/tmp/x", "--model", "m", "--brave"]).unwrap();
        let overrides = cli.overrides();

        assert_eq!(overrides.project_path, Some(PathBuf::from("/tmp/x")));
        assert_eq!(overrides.model.as_deref(), Some("m"));
        assert!(overrides.auto_approve);
        assert_eq!(overrides.log_level, None);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["delve"]).unwrap();
        assert!(!cli.brave);
        assert!(cli.project_path.is_none());
        assert!(cli.config.is_none());
    }
}
