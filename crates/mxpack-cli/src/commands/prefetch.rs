//! Offline dependency download command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mxpack_pipeline::{FetchOutcome, Prefetcher};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use super::load_config;

pub async fn prefetch(
    config_path: &Path,
    source: &Path,
    buildpack_url: Option<Url>,
    cache_dir: Option<PathBuf>,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(cache_dir) = cache_dir {
        config.prefetch.cache_dir = cache_dir;
    }
    let buildpack_url = buildpack_url.unwrap_or_else(|| config.prefetch.buildpack_url.clone());

    let prefetcher = Prefetcher::from_config(&config);
    let report = tokio::select! {
        report = prefetcher.prefetch(source, &buildpack_url) => {
            report.context("Failed to prefetch dependencies")?
        }
        _ = cancel.cancelled() => return Err(mxpack_core::Error::Cancelled.into()),
    };

    report_outcome("buildpack", &report.buildpack);
    match &report.compiler {
        Some(outcome) => report_outcome("mxbuild", outcome),
        None => warn!(
            cache = %prefetcher.cache_dir().display(),
            "Download mxbuild-<version>.tar.gz into the cache manually if needed"
        ),
    }
    Ok(())
}

fn report_outcome(name: &str, outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::AlreadyCached(path) => info!(artifact = name, path = %path.display(), "Already cached"),
        FetchOutcome::Downloaded { path, bytes } => {
            info!(artifact = name, path = %path.display(), bytes, "Downloaded")
        }
        FetchOutcome::Failed(reason) => warn!(artifact = name, reason = %reason, "Not downloaded"),
    }
}
