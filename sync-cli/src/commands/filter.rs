//! Print the sync filter derived from configuration.

use anyhow::{Context, Result};

use crate::config::CliConfig;

/// Run the filter command.
pub fn run(config: &CliConfig) -> Result<()> {
    let json = config
        .sync_config()
        .filter()
        .to_json()
        .context("Failed to encode filter")?;
    println!("{}", json);
    Ok(())
}
