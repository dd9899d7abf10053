//! Output directory preparation.

use std::path::{Path, PathBuf};

use mxpack_core::Result;
use tracing::{debug, info};

use crate::fs::copy_dir_all;

/// Static deployment files copied into every destination.
#[derive(Debug, Clone)]
pub struct Scaffold {
    /// Deployment descriptor, copied to `<dest>/Dockerfile`.
    pub dockerfile: PathBuf,
    /// Supporting scripts, copied to `<dest>/scripts`.
    pub scripts: PathBuf,
}

impl Scaffold {
    /// Scaffolding laid out as `Dockerfile` and `scripts/` under `root`.
    pub fn from_root(root: &Path) -> Self {
        Self {
            dockerfile: root.join("Dockerfile"),
            scripts: root.join("scripts"),
        }
    }
}

/// Reset `destination` and seed it with the scaffold.
///
/// Existing entries are removed without following symbolic links, so links
/// pointing outside the tree never lose their targets. Returns the empty
/// `project/` directory that receives the deployment.
pub async fn prepare_destination(destination: &Path, scaffold: &Scaffold) -> Result<PathBuf> {
    if tokio::fs::symlink_metadata(destination).await.is_ok() {
        info!(dest = %destination.display(), "Cleaning destination");
        clear_directory(destination).await?;
    } else {
        tokio::fs::create_dir_all(destination).await?;
        set_dir_mode(destination).await?;
    }

    let project_dir = destination.join("project");
    tokio::fs::create_dir(&project_dir).await?;
    set_dir_mode(&project_dir).await?;

    copy_dir_all(&scaffold.scripts, &destination.join("scripts")).await?;
    tokio::fs::copy(&scaffold.dockerfile, destination.join("Dockerfile")).await?;

    debug!(project = %project_dir.display(), "Destination prepared");
    Ok(project_dir)
}

async fn clear_directory(dir: &Path) -> Result<()> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        // DirEntry::file_type does not follow symlinks.
        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            tokio::fs::remove_dir_all(entry.path()).await?;
        } else {
            tokio::fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn set_dir_mode(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_dir_mode(_dir: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::write_scaffold;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_creates_missing_destination() {
        let scaffold_root = TempDir::new().unwrap();
        let scaffold = write_scaffold(scaffold_root.path());
        let out = TempDir::new().unwrap();
        let dest = out.path().join("nested/dest");

        let project = prepare_destination(&dest, &scaffold).await.unwrap();

        assert_eq!(project, dest.join("project"));
        assert!(project.is_dir());
        assert_eq!(fs::read_dir(&project).unwrap().count(), 0);
        assert_eq!(fs::read_to_string(dest.join("Dockerfile")).unwrap(), "FROM runtime\n");
        assert!(dest.join("scripts/startup.py").is_file());
    }

    #[tokio::test]
    async fn test_resets_existing_destination() {
        let scaffold_root = TempDir::new().unwrap();
        let scaffold = write_scaffold(scaffold_root.path());
        let dest = TempDir::new().unwrap();
        fs::create_dir_all(dest.path().join("project/model")).unwrap();
        fs::write(dest.path().join("project/model/stale.json"), "{}").unwrap();
        fs::write(dest.path().join("leftover.txt"), "old").unwrap();

        prepare_destination(dest.path(), &scaffold).await.unwrap();

        assert!(!dest.path().join("leftover.txt").exists());
        assert!(!dest.path().join("project/model").exists());
        assert!(dest.path().join("Dockerfile").is_file());
    }

    #[tokio::test]
    async fn test_is_idempotent() {
        let scaffold_root = TempDir::new().unwrap();
        let scaffold = write_scaffold(scaffold_root.path());
        let dest = TempDir::new().unwrap();

        prepare_destination(dest.path(), &scaffold).await.unwrap();
        let project = prepare_destination(dest.path(), &scaffold).await.unwrap();

        assert!(project.is_dir());
        assert!(dest.path().join("scripts/startup.py").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_does_not_follow_symlinks() {
        let scaffold_root = TempDir::new().unwrap();
        let scaffold = write_scaffold(scaffold_root.path());

        let shared = TempDir::new().unwrap();
        fs::write(shared.path().join("precious.txt"), "keep me").unwrap();

        let dest = TempDir::new().unwrap();
        std::os::unix::fs::symlink(shared.path(), dest.path().join("shared")).unwrap();

        prepare_destination(dest.path(), &scaffold).await.unwrap();

        assert!(!dest.path().join("shared").exists());
        assert_eq!(
            fs::read_to_string(shared.path().join("precious.txt")).unwrap(),
            "keep me"
        );
    }

    #[tokio::test]
    async fn test_missing_scaffold_is_error() {
        let dest = TempDir::new().unwrap();
        let scaffold = Scaffold::from_root(&dest.path().join("no-such-scaffold"));

        assert!(prepare_destination(&dest.path().join("out"), &scaffold).await.is_err());
    }
}
