//! Tracing subscriber setup shared by the binaries

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr so stdout stays
/// machine-readable. `RUST_LOG` directives are honoured on top of the
/// configured level.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(
            format!("fuel_fraud_detection={}", config.level)
                .parse()
                .context("Invalid logging.level")?,
        )
        .add_directive(format!("fuel_fraud_detect={}", config.level).parse()?)
        .add_directive(format!("train_model={}", config.level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if config.is_json() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("Failed to install tracing subscriber")
}
