//! Input kind detection.

use std::path::{Path, PathBuf};

use mxpack_core::source::{
    DEPLOYMENT_ARCHIVE_EXT, PACKED_PROJECT_EXT, PROJECT_FILE_EXT, SourceDescriptor, SourceKind,
};
use mxpack_core::{Error, Result};
use tempfile::TempDir;
use tracing::info;

use crate::archive::{extract_to_temp, find_default_file};

/// A detected input, together with any scratch space it lives in.
///
/// When the input came out of a packed project archive the extraction
/// directory is owned here and removed on drop.
#[derive(Debug)]
pub struct ResolvedSource {
    pub descriptor: SourceDescriptor,
    extracted: Option<TempDir>,
}

impl ResolvedSource {
    pub fn kind(&self) -> SourceKind {
        self.descriptor.kind
    }

    pub fn path(&self) -> &Path {
        &self.descriptor.path
    }

    /// Directory holding the project when the input is compilable.
    pub fn project_dir(&self) -> Option<PathBuf> {
        if self.kind().needs_compilation() {
            self.descriptor.path.parent().map(Path::to_path_buf)
        } else {
            None
        }
    }

    pub fn is_extracted(&self) -> bool {
        self.extracted.is_some()
    }
}

/// Detect what kind of input `source` is.
///
/// Kinds are tried in order: packed project archive (unpacked first so the
/// project inside it wins), project file, deployment archive, then a plain
/// directory.
pub async fn resolve_source(source: &Path) -> Result<ResolvedSource> {
    if tokio::fs::metadata(source).await.is_err() {
        return Err(Error::UnsupportedInput(source.to_path_buf()));
    }

    let mut root = source.to_path_buf();
    let mut extracted = None;
    if let Some(mpk) = find_default_file(source, PACKED_PROJECT_EXT).await? {
        info!(archive = %mpk.display(), "Unpacking project archive");
        let temp_dir = extract_to_temp(&mpk).await?;
        root = temp_dir.path().to_path_buf();
        extracted = Some(temp_dir);
    }

    let descriptor = if let Some(mpr) = find_default_file(&root, PROJECT_FILE_EXT).await? {
        let path = std::path::absolute(&mpr)?;
        let kind = if extracted.is_some() {
            SourceKind::PackedProject
        } else {
            SourceKind::RawProject
        };
        SourceDescriptor::new(kind, path)
    } else if let Some(mda) = find_default_file(&root, DEPLOYMENT_ARCHIVE_EXT).await? {
        SourceDescriptor::new(SourceKind::DeploymentArchive, mda)
    } else if tokio::fs::metadata(&root).await?.is_dir() {
        SourceDescriptor::new(SourceKind::UnpackedDeployment, root)
    } else {
        return Err(Error::UnsupportedInput(source.to_path_buf()));
    };

    info!(kind = %descriptor.kind, path = %descriptor.path.display(), "Resolved source");
    Ok(ResolvedSource {
        descriptor,
        extracted,
    })
}
