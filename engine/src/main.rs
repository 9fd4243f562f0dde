// Delve
// Main entry point for the delve binary

use clap::Parser;
use delve_engine::cli::Cli;
use delve_engine::handlers::handle_chat;
use delve_engine::telemetry::init_telemetry_with_level;
use sdk::errors::{EngineError, ErrorExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Flag level first; the config level applies once the file is read
    // unless this one already took effect.
    if let Some(level) = &cli.log {
        init_telemetry_with_level(level);
    }

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    if let Err(e) = handle_chat(cli).await {
        tracing::error!("Delve v{} ({} - {}) failed: {:#}", version, commit, timestamp, e);
        eprintln!("Error: {:#}", e);
        if let Some(engine_error) = e.downcast_ref::<EngineError>() {
            eprintln!("Hint: {}", engine_error.user_hint());
        }
        std::process::exit(1);
    }
}
