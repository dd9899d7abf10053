//! Offline download cache.
//!
//! Populates a cache directory with everything a networkless build needs:
//! the buildpack archive and the compiler tarball matching the project.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use mxpack_config::BuildConfig;
use mxpack_core::image::{BuilderImageRef, host_arch};
use mxpack_core::source::PROJECT_FILE_EXT;
use mxpack_source::fs::find_file_recursive;
use mxpack_source::read_product_version;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use url::Url;

/// Cache file name of the buildpack archive.
pub const BUILDPACK_FILE_NAME: &str = "cf-mendix-buildpack.zip";

#[derive(Debug, Error)]
pub enum PrefetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Build(#[from] mxpack_core::Error),
}

pub type PrefetchResult<T> = std::result::Result<T, PrefetchError>;

/// Result of fetching one file. Failures are reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    AlreadyCached(PathBuf),
    Downloaded { path: PathBuf, bytes: u64 },
    Failed(String),
}

impl FetchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }
}

/// What a prefetch run did.
#[derive(Debug)]
pub struct PrefetchReport {
    pub buildpack: FetchOutcome,
    /// Product version found in the source, if any.
    pub version: Option<String>,
    /// `None` when no version was detected.
    pub compiler: Option<FetchOutcome>,
}

pub struct Prefetcher {
    client: reqwest::Client,
    cache_dir: PathBuf,
    download_url: Url,
    arch: String,
}

impl Prefetcher {
    pub fn new(cache_dir: impl Into<PathBuf>, download_url: Url, arch: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache_dir: cache_dir.into(),
            download_url,
            arch: arch.into(),
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        let arch = config
            .platform_arch
            .clone()
            .unwrap_or_else(|| host_arch().to_string());
        Self::new(&config.prefetch.cache_dir, config.download_url.clone(), arch)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub async fn ensure_cache_dir(&self) -> PrefetchResult<()> {
        if tokio::fs::metadata(&self.cache_dir).await.is_ok() {
            info!(dir = %self.cache_dir.display(), "Cache directory exists");
        } else {
            info!(dir = %self.cache_dir.display(), "Creating cache directory");
            tokio::fs::create_dir_all(&self.cache_dir).await?;
        }
        Ok(())
    }

    /// Download `url` into the cache as `file_name` unless it is already there.
    ///
    /// A failed download leaves no partial file behind.
    pub async fn fetch(&self, url: &Url, file_name: &str) -> FetchOutcome {
        let dest = self.cache_dir.join(file_name);
        if tokio::fs::metadata(&dest).await.is_ok() {
            info!(file = %file_name, "File already cached, skipping download");
            return FetchOutcome::AlreadyCached(dest);
        }

        info!(url = %url, file = %file_name, "Downloading");
        match self.download(url, &dest).await {
            Ok(bytes) => {
                info!(file = %file_name, bytes, "Downloaded");
                FetchOutcome::Downloaded { path: dest, bytes }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to download");
                if tokio::fs::metadata(&dest).await.is_ok() {
                    if let Err(e) = tokio::fs::remove_file(&dest).await {
                        warn!(file = %dest.display(), error = %e, "Failed to remove partial download");
                    }
                }
                FetchOutcome::Failed(e.to_string())
            }
        }
    }

    async fn download(&self, url: &Url, dest: &Path) -> PrefetchResult<u64> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    /// Product version of the first project file found anywhere under `source`.
    pub async fn detect_version(&self, source: &Path) -> Option<String> {
        let project_file = match find_file_recursive(source, PROJECT_FILE_EXT).await {
            Ok(Some(path)) => path,
            Ok(None) => {
                warn!(source = %source.display(), "No project file found, cannot determine product version");
                return None;
            }
            Err(e) => {
                warn!(source = %source.display(), error = %e, "Cannot search for project file");
                return None;
            }
        };

        info!(project = %project_file.display(), "Found project file");
        match read_product_version(&project_file).await {
            Ok(version) => {
                info!(version = %version, "Detected product version");
                Some(version)
            }
            Err(e) => {
                warn!(error = %e, "Error reading project file");
                None
            }
        }
    }

    /// Fill the cache for building `source` without network access.
    pub async fn prefetch(&self, source: &Path, buildpack_url: &Url) -> PrefetchResult<PrefetchReport> {
        self.ensure_cache_dir().await?;

        let buildpack = self.fetch(buildpack_url, BUILDPACK_FILE_NAME).await;

        let version = self.detect_version(source).await;
        let compiler = match &version {
            Some(version) => {
                let image = BuilderImageRef::for_version(version, self.arch.clone())?;
                let url = image.download_url(&self.download_url)?;
                Some(self.fetch(&url, &image.artifact_file_name()).await)
            }
            None => {
                warn!(
                    cache = %self.cache_dir.display(),
                    "Could not detect product version; compiler tarball will not be downloaded"
                );
                None
            }
        };

        Ok(PrefetchReport {
            buildpack,
            version,
            compiler,
        })
    }
}
