use anyhow::{anyhow, Result};
use std::io;
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber on stderr. `RUST_LOG` overrides `default_level`.
pub fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}
