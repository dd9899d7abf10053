//! Version-control revision lookup.
//!
//! Only the plain files under `.git/` are read; no git tooling is required.

use std::path::Path;

use mxpack_core::{BestEffort, Error, Result, RevisionId};
use tracing::{debug, warn};

async fn read_first_line(path: &Path) -> Result<String> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(content.lines().next().unwrap_or_default().to_string())
}

/// Read the commit checked out in `project_dir`.
///
/// Handles a detached HEAD holding a raw hash and a symbolic
/// `ref: refs/heads/<branch>` pointing at a loose branch file.
pub async fn read_revision(project_dir: &Path) -> Result<RevisionId> {
    let git_dir = project_dir.join(".git");
    let head = git_dir.join("HEAD");
    if !tokio::fs::metadata(&head).await.map(|m| m.is_file()).unwrap_or(false) {
        return Err(Error::Revision(
            "project source doesn't contain git metadata".to_string(),
        ));
    }

    let line = read_first_line(&head).await?;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [hash] => {
            debug!(commit = %hash, "Detached HEAD");
            Ok(RevisionId::Commit(hash.to_string()))
        }
        ["ref:", reference] => {
            let branch_file = reference
                .split('/')
                .fold(git_dir.clone(), |path, part| path.join(part));
            if !tokio::fs::metadata(&branch_file)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false)
            {
                return Err(Error::Revision(format!(
                    "branch file {} doesn't exist",
                    branch_file.display()
                )));
            }
            let hash = read_first_line(&branch_file).await?.trim().to_string();
            if hash.is_empty() {
                return Err(Error::Revision(format!(
                    "branch file {} is empty",
                    branch_file.display()
                )));
            }
            debug!(reference = %reference, commit = %hash, "Resolved branch tip");
            Ok(RevisionId::Commit(hash))
        }
        _ => Err(Error::Revision(format!("unsupported HEAD format {:?}", line))),
    }
}

/// Resolve the revision, substituting [`RevisionId::Unversioned`] on any
/// failure.
pub async fn resolve_revision(project_dir: &Path) -> BestEffort<RevisionId> {
    let outcome = BestEffort::or_fallback(read_revision(project_dir).await, RevisionId::Unversioned);
    if let Some(cause) = outcome.cause() {
        warn!(
            error = %cause,
            "Cannot determine git commit, will set model version to unversioned"
        );
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    const HASH: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

    fn git_dir(root: &Path) -> std::path::PathBuf {
        let git = root.join(".git");
        fs::create_dir_all(&git).unwrap();
        git
    }

    #[tokio::test]
    async fn test_detached_head_returns_hash() {
        let dir = TempDir::new().unwrap();
        fs::write(git_dir(dir.path()).join("HEAD"), format!("{HASH}\n")).unwrap();

        let revision = read_revision(dir.path()).await.unwrap();
        assert_eq!(revision, RevisionId::Commit(HASH.to_string()));
    }

    #[tokio::test]
    async fn test_branch_reference_returns_tip() {
        let dir = TempDir::new().unwrap();
        let git = git_dir(dir.path());
        fs::write(git.join("HEAD"), "ref: refs/heads/feature/login\n").unwrap();
        fs::create_dir_all(git.join("refs/heads/feature")).unwrap();
        fs::write(git.join("refs/heads/feature/login"), format!("{HASH}\n")).unwrap();

        let revision = read_revision(dir.path()).await.unwrap();
        assert_eq!(revision, RevisionId::Commit(HASH.to_string()));
    }

    #[tokio::test]
    async fn test_missing_branch_file_is_error() {
        let dir = TempDir::new().unwrap();
        fs::write(git_dir(dir.path()).join("HEAD"), "ref: refs/heads/main\n").unwrap();

        assert!(matches!(read_revision(dir.path()).await, Err(Error::Revision(_))));
    }

    #[tokio::test]
    async fn test_malformed_head_is_error() {
        let dir = TempDir::new().unwrap();
        fs::write(git_dir(dir.path()).join("HEAD"), "ref: refs/heads/main extra\n").unwrap();

        assert!(matches!(read_revision(dir.path()).await, Err(Error::Revision(_))));
    }

    #[tokio::test]
    async fn test_two_tokens_without_ref_prefix_is_error() {
        let dir = TempDir::new().unwrap();
        let git = git_dir(dir.path());
        fs::write(git.join("HEAD"), "tip: refs/heads/main\n").unwrap();
        fs::create_dir_all(git.join("refs/heads")).unwrap();
        fs::write(git.join("refs/heads/main"), format!("{HASH}\n")).unwrap();

        assert!(matches!(read_revision(dir.path()).await, Err(Error::Revision(_))));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_missing_metadata_falls_back_to_unversioned() {
        let dir = TempDir::new().unwrap();

        let outcome = resolve_revision(dir.path()).await;
        assert!(outcome.is_degraded());
        assert_eq!(outcome.into_value(), RevisionId::Unversioned);
        assert!(logs_contain("unversioned"));
    }

    #[tokio::test]
    async fn test_empty_head_falls_back_to_unversioned() {
        let dir = TempDir::new().unwrap();
        fs::write(git_dir(dir.path()).join("HEAD"), "").unwrap();

        assert_eq!(resolve_revision(dir.path()).await.into_value(), RevisionId::Unversioned);
    }

    #[tokio::test]
    async fn test_resolved_revision_is_not_degraded() {
        let dir = TempDir::new().unwrap();
        fs::write(git_dir(dir.path()).join("HEAD"), HASH).unwrap();

        let outcome = resolve_revision(dir.path()).await;
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.value().as_str(), HASH);
    }
}
