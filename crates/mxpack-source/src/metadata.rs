//! Deployment metadata acceptance check.

use std::path::{Path, PathBuf};

use mxpack_core::{Error, Result};
use tracing::{debug, warn};

/// Location of the metadata descriptor inside an unpacked deployment.
pub fn metadata_path(project_dir: &Path) -> PathBuf {
    project_dir.join("model").join("metadata.json")
}

/// Read and parse the deployment metadata, if present and well formed.
pub async fn read_metadata(project_dir: &Path) -> Option<serde_json::Value> {
    let path = metadata_path(project_dir);
    let content = tokio::fs::read_to_string(&path).await.ok()?;
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Deployment metadata is not valid JSON");
            None
        }
    }
}

/// Fail unless `project_dir` holds a recognizable deployment.
pub async fn verify_metadata(project_dir: &Path) -> Result<()> {
    match read_metadata(project_dir).await {
        Some(_) => {
            debug!(dir = %project_dir.display(), "Deployment metadata found");
            Ok(())
        }
        None => Err(Error::MissingMetadata(project_dir.to_path_buf())),
    }
}
