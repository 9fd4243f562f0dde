//! Telemetry and Observability
//!
//! Handles setting up `tracing-subscriber` for structured logging.
//! Logs go to stderr so they never interleave with the conversation on
//! stdout.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber with the given log level.
///
/// Priority: `RUST_LOG` env var > `log_level` parameter
///
/// In debug builds: pretty-printed terminal output.
/// In release builds: JSON structured output with spans.
///
/// Only the first call installs a subscriber; later calls are no-ops.
pub fn init_telemetry_with_level(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    }
}

/// Dependencies stay at `warn` unless the level asks for less
fn default_filter(log_level: &str) -> String {
    format!("warn,delve_engine={0},delve={0},sdk={0}", log_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        for level in ["error", "warn", "info", "debug", "trace"] {
            let filter = default_filter(level);
            assert!(filter.contains(&format!("delve_engine={}", level)));
            assert!(EnvFilter::try_new(&filter).is_ok());
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        init_telemetry_with_level("debug");
        init_telemetry_with_level("info");
    }
}
