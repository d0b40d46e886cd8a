//! Structured logging setup, teacher pattern: JSON formatting over an
//! `EnvFilter` built from the configured log level.

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::Result;

pub fn init_tracing(config: &Config) -> Result<()> {
    let log_level = config.service.log_level.clone();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(service = %config.service.name, "tracing initialized");
    Ok(())
}
