//! Directory tree helpers.

use std::path::{Path, PathBuf};

use mxpack_core::Result;

/// Recursively copy the contents of `src` into `dst`, merging with anything
/// already present in `dst`.
#[async_recursion::async_recursion]
pub async fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dst).await?;

    let mut entries = tokio::fs::read_dir(src).await?;
    while let Some(entry) = entries.next_entry().await? {
        let target = dst.join(entry.file_name());
        let metadata = tokio::fs::metadata(entry.path()).await?;
        if metadata.is_dir() {
            copy_dir_all(&entry.path(), &target).await?;
        } else {
            tokio::fs::copy(entry.path(), &target).await?;
        }
    }

    Ok(())
}

/// Recursively find the first file ending in `extension` below `root`.
#[async_recursion::async_recursion]
pub async fn find_file_recursive(root: &Path, extension: &str) -> Result<Option<PathBuf>> {
    let mut dirs = Vec::new();
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        } else if entry.file_name().to_string_lossy().ends_with(extension) {
            return Ok(Some(entry.path()));
        }
    }

    dirs.sort();
    for dir in dirs {
        if let Some(found) = find_file_recursive(&dir, extension).await? {
            return Ok(Some(found));
        }
    }

    Ok(None)
}
