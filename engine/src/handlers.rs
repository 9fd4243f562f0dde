//! Command handlers
//!
//! Wires configuration, credentials, tools and the model endpoint into an
//! interactive session.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::agent::{
    AutoApprove, CommandProcessor, ConfirmationGate, ConversationDriver, Prompter, Session,
    TerminalConfirm, TerminalObserver,
};
use crate::cli::Cli;
use crate::config::Config;
use crate::llm::OpenAIProvider;
use crate::secrets::load_api_key;
use crate::telemetry::init_telemetry_with_level;
use crate::tools::{ToolEnv, ToolRegistry};

/// Resolve the configuration: file, then command-line overrides, then
/// validation.
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply_overrides(cli.overrides());
    config
        .validate_and_process()
        .context("Invalid configuration")?;
    Ok(config)
}

/// Start an interactive chat session
///
/// Fails before any prompt is shown when the credential is missing.
pub async fn handle_chat(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    init_telemetry_with_level(&config.core.log_level);

    let api_key = load_api_key(&config.llm.api_key_env)?;

    let env = ToolEnv::new(&config.core.project_path, config.tools.clone())
        .context("Failed to prepare tool environment")?;
    let registry = Arc::new(ToolRegistry::new(env)?);
    info!(
        "Project root: {} ({} tools)",
        config.core.project_path.display(),
        registry.names().len()
    );

    let prompter = Arc::new(Prompter::stdin());
    let gate: Arc<dyn ConfirmationGate> = if config.agent.auto_approve {
        info!("Auto-approve enabled, tool calls will not be confirmed");
        Arc::new(AutoApprove)
    } else {
        Arc::new(TerminalConfirm::new(Arc::clone(&prompter)))
    };

    let provider = Arc::new(
        OpenAIProvider::new(config.llm.clone(), Some(api_key))
            .context("Failed to create model client")?,
    );
    let driver = ConversationDriver::new(
        provider,
        registry,
        gate,
        &config.agent,
        config.llm.model.clone(),
    )
    .with_observer(Arc::new(TerminalObserver));

    let commands = CommandProcessor::load(config.agent.commands_file.as_deref());
    Session::new(driver, commands, prompter).run().await
}
