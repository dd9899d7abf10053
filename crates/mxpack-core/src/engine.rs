//! Container engine trait and build process types.
//!
//! The orchestrator drives builds through [`ContainerEngine`]; the CLI-backed
//! implementation lives in `mxpack-executor`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Engine-assigned container identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct ContainerHandle(String);

impl ContainerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum LogStream {
    #[display("stdout")]
    Stdout,
    #[display("stderr")]
    Stderr,
}

/// A line of engine output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub stream: LogStream,
    pub content: String,
}

/// Exit status of an engine process plus the last line seen on each stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub last_stdout: Option<String>,
    pub last_stderr: Option<String>,
}

impl BuildOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Convert a failed exit into [`Error::BuildFailed`], otherwise yield the
    /// last stdout line.
    ///
    /// The engine writes progress to stderr, so the carried line is the best
    /// available diagnostic rather than a guaranteed error message.
    pub fn into_result(self) -> Result<Option<String>> {
        if self.success() {
            Ok(self.last_stdout)
        } else {
            Err(Error::BuildFailed {
                code: self.exit_code,
                last_stderr: self.last_stderr,
            })
        }
    }
}

/// Parameters for building a builder image locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBuildSpec {
    /// Image reference to tag the result with.
    pub image: String,
    /// Build context directory.
    pub context: PathBuf,
    /// Build definition file.
    pub dockerfile: PathBuf,
    /// `--build-arg` pairs.
    pub build_args: Vec<(String, String)>,
}

/// Operations the build orchestrator needs from a container engine.
///
/// Every call takes the run's cancellation token; implementations must stop
/// the underlying work and return [`Error::Cancelled`] once it fires.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Name of the engine, for logs.
    fn name(&self) -> String;

    /// Pull an image from a registry.
    async fn pull_image(&self, image: &str, cancel: &CancellationToken) -> Result<()>;

    /// Build and tag an image.
    async fn build_image(&self, spec: &ImageBuildSpec, cancel: &CancellationToken) -> Result<()>;

    /// Push an image to its registry.
    async fn push_image(&self, image: &str, cancel: &CancellationToken) -> Result<()>;

    /// Create a container from `image` with the given startup arguments.
    async fn create_container(
        &self,
        image: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<ContainerHandle>;

    /// Copy the contents of a host directory to a path inside the container.
    async fn copy_into(
        &self,
        handle: &ContainerHandle,
        source_dir: &Path,
        container_path: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Start the container attached and wait for it to exit.
    async fn start_attached(
        &self,
        handle: &ContainerHandle,
        cancel: &CancellationToken,
    ) -> Result<BuildOutcome>;

    /// Copy a path out of the container into a host directory.
    async fn copy_out(
        &self,
        handle: &ContainerHandle,
        container_path: &str,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Force-remove a container.
    async fn remove_container(&self, handle: &ContainerHandle) -> Result<()>;
}
