//! Locating input files and unpacking zip archives.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use mxpack_core::{Error, Result};
use tempfile::TempDir;
use tracing::{debug, info};

/// Prefix for every scratch directory created by mxpack.
pub const TEMP_PREFIX: &str = "mxpack-";

/// Find the single file ending in `extension` at `source`.
///
/// A file is returned unchanged when it matches and ignored otherwise. For a
/// directory only its immediate entries are considered; more than one match
/// is an [`Error::AmbiguousInput`].
pub async fn find_default_file(source: &Path, extension: &str) -> Result<Option<PathBuf>> {
    let metadata = tokio::fs::metadata(source).await?;
    if metadata.is_file() {
        let matches = source
            .file_name()
            .map(|name| name.to_string_lossy().ends_with(extension))
            .unwrap_or(false);
        return Ok(matches.then(|| source.to_path_buf()));
    }

    let mut matches = Vec::new();
    let mut entries = tokio::fs::read_dir(source).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().ends_with(extension) {
            matches.push(entry.path());
        }
    }

    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        _ => Err(Error::AmbiguousInput {
            extension: extension.to_string(),
            dir: source.to_path_buf(),
        }),
    }
}

/// Unpack a zip archive into a fresh temporary directory.
///
/// The directory and its contents are removed when the returned value is
/// dropped.
pub async fn extract_to_temp(archive: &Path) -> Result<TempDir> {
    let temp_dir = tempfile::Builder::new().prefix(TEMP_PREFIX).tempdir()?;
    extract_into(archive, temp_dir.path()).await?;
    Ok(temp_dir)
}

/// Unpack a zip archive into an existing directory.
pub async fn extract_into(archive: &Path, dest: &Path) -> Result<()> {
    info!(archive = %archive.display(), dest = %dest.display(), "Extracting archive");
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || unpack_zip(&archive, &dest))
        .await
        .map_err(|e| Error::Archive(format!("extraction task failed: {}", e)))?
}

fn unpack_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| {
        Error::Archive(format!("failed to open {}: {}", archive_path.display(), e))
    })?;

    fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| Error::Archive(format!("failed to read zip entry: {}", e)))?;

        let path = file.enclosed_name().ok_or_else(|| {
            Error::Archive(format!("unsafe entry name in archive: {}", file.name()))
        })?;
        let dest_path = dest.join(&path);

        if file.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut outfile = File::create(&dest_path)?;
        std::io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode))?;
            }
        }
    }

    debug!(entries = archive.len(), dest = %dest.display(), "Archive extracted");
    Ok(())
}
