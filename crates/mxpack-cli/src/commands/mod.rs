//! CLI command implementations.

pub mod build;
pub mod prefetch;
pub mod validate;

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use mxpack_config::{BuildConfig, load_build_config};
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub(crate) fn load_config(path: &Path) -> Result<BuildConfig> {
    load_build_config(path)
        .with_context(|| format!("Failed to load configuration: {}", path.display()))
}

/// Whether the error chain ends in a cancelled run.
pub(crate) fn is_cancelled(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<mxpack_core::Error>()
        .is_some_and(|e| e.is_cancelled())
}

/// Cancel on the first interrupt, then wait for a second one.
///
/// Returns `true` when a second interrupt arrived and the caller should exit
/// without waiting for cleanup. Returns `false` if interrupts can no longer
/// be received.
pub(crate) async fn watch_interrupts<F, Fut>(mut next_interrupt: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = next_interrupt().await {
        warn!(error = %e, "Cannot listen for interrupts");
        return false;
    }
    warn!("Interrupted, cleaning up (interrupt again to exit immediately)");
    cancel.cancel();

    if next_interrupt().await.is_err() {
        return false;
    }
    warn!("Interrupted again, exiting without cleanup");
    true
}
