//! Logging initialization using tracing.

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::domain::models::config::LoggingConfig;

/// Initialize the global tracing subscriber.
///
/// Call once from `main` before any phase runs. The `RUST_LOG` env var
/// still takes precedence over the configured level.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let default_level = parse_level(&config.level)?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_current_span(false)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
    }

    Ok(())
}

fn parse_level(level: &str) -> Result<Level> {
    match level {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(anyhow!("Invalid log level: {other}")),
    }
}
