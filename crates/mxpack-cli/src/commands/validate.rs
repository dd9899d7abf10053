//! Configuration validation command.

use std::path::Path;

use anyhow::{Context, Result, bail};
use mxpack_config::parse_build_config;

pub fn validate(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    match parse_build_config(&content) {
        Ok(config) => {
            println!("Configuration is valid");
            println!("  engines: {}", config.engines.join(", "));
            if let Some(repository) = &config.artifacts_repository {
                println!("  artifacts repository: {}", repository);
            }
            Ok(())
        }
        Err(e) => bail!("Configuration error in {}: {}", path.display(), e),
    }
}
