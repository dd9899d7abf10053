//! Containerized deployment build command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use mxpack_executor::CliEngine;
use mxpack_pipeline::Pipeline;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::load_config;

/// Build `source` into a deployment directory at `destination`.
pub async fn build_mda_dir(
    config_path: &Path,
    source: &Path,
    destination: &Path,
    artifacts_repository: Option<String>,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if artifacts_repository.is_some() {
        config.artifacts_repository = artifacts_repository;
    }

    let engine = Arc::new(CliEngine::with_preferences(config.engines.clone()));
    let pipeline = Pipeline::new(engine, config);

    let project = pipeline
        .run(source, destination, cancel)
        .await
        .context("Failed to build")?;

    info!(project = %project.display(), "Build complete");
    Ok(())
}
