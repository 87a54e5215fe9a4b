//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr through `tracing`, separate from the event log
//! (the audit trail) and from command output on stdout. `RUST_LOG` wins when
//! set; otherwise the level comes from the number of `-v` flags.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

fn base_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Our crate at the requested level, noisy dependencies held at warn.
pub fn build_filter(verbosity: u8) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = base_level(verbosity);
    let directives = format!("file_tracker={},ftrack={},sqlx=warn", level, level);
    EnvFilter::try_new(directives).map_err(|e| anyhow!("Invalid log filter: {}", e))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(verbosity: u8) -> Result<()> {
    let filter = build_filter(verbosity)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
