//! Container engine driven through the `podman`/`docker` command line.

use std::path::Path;

use async_trait::async_trait;
use mxpack_core::engine::{BuildOutcome, ContainerEngine, ContainerHandle, ImageBuildSpec};
use mxpack_core::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::process::ProcessStreamer;

/// [`ContainerEngine`] backed by an engine CLI.
///
/// Both supported engines accept the same argument shapes, so the binary is
/// resolved lazily on each call.
pub struct CliEngine {
    streamer: ProcessStreamer,
}

impl CliEngine {
    pub fn new(streamer: ProcessStreamer) -> Self {
        Self { streamer }
    }

    /// Probe the named engines in order.
    pub fn with_preferences(preferences: Vec<String>) -> Self {
        Self::new(ProcessStreamer::new(preferences))
    }
}

impl Default for CliEngine {
    fn default() -> Self {
        Self::new(ProcessStreamer::default())
    }
}

#[async_trait]
impl ContainerEngine for CliEngine {
    fn name(&self) -> String {
        self.streamer
            .locate()
            .map(|binary| binary.name)
            .unwrap_or_else(|_| "container-engine".to_string())
    }

    async fn pull_image(&self, image: &str, cancel: &CancellationToken) -> Result<()> {
        info!(image = %image, "Pulling builder image");
        self.streamer.call(&pull_args(image), cancel).await?;
        Ok(())
    }

    async fn build_image(&self, spec: &ImageBuildSpec, cancel: &CancellationToken) -> Result<()> {
        info!(image = %spec.image, "Building builder image");
        self.streamer.call(&build_args(spec), cancel).await?;
        Ok(())
    }

    async fn push_image(&self, image: &str, cancel: &CancellationToken) -> Result<()> {
        info!(image = %image, "Pushing builder image");
        self.streamer.call(&push_args(image), cancel).await?;
        Ok(())
    }

    async fn create_container(
        &self,
        image: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<ContainerHandle> {
        let id = self
            .streamer
            .call(&create_args(image, args), cancel)
            .await?
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .ok_or_else(|| Error::Engine("container create printed no container id".to_string()))?;

        info!(container = %id, image = %image, "Created build container");
        Ok(ContainerHandle::new(id))
    }

    async fn copy_into(
        &self,
        handle: &ContainerHandle,
        source_dir: &Path,
        container_path: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let source_dir = std::path::absolute(source_dir)?;
        self.streamer
            .call(&copy_into_args(handle, &source_dir, container_path), cancel)
            .await?;
        Ok(())
    }

    async fn start_attached(
        &self,
        handle: &ContainerHandle,
        cancel: &CancellationToken,
    ) -> Result<BuildOutcome> {
        info!(container = %handle, "Starting build container");
        self.streamer.run(&start_args(handle), cancel).await
    }

    async fn copy_out(
        &self,
        handle: &ContainerHandle,
        container_path: &str,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.streamer
            .call(&copy_out_args(handle, container_path, dest_dir), cancel)
            .await?;
        Ok(())
    }

    async fn remove_container(&self, handle: &ContainerHandle) -> Result<()> {
        self.streamer
            .call(&remove_args(handle), &CancellationToken::new())
            .await?;
        info!(container = %handle, "Removed build container");
        Ok(())
    }
}

fn owned(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

pub(crate) fn pull_args(image: &str) -> Vec<String> {
    owned(&["image", "pull", image])
}

pub(crate) fn push_args(image: &str) -> Vec<String> {
    owned(&["image", "push", image])
}

pub(crate) fn build_args(spec: &ImageBuildSpec) -> Vec<String> {
    let mut args = owned(&["image", "build"]);
    for (key, value) in &spec.build_args {
        args.push("--build-arg".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push("--file".to_string());
    args.push(spec.dockerfile.display().to_string());
    args.push("--tag".to_string());
    args.push(spec.image.clone());
    args.push(spec.context.display().to_string());
    args
}

pub(crate) fn create_args(image: &str, startup: &[String]) -> Vec<String> {
    let mut args = owned(&["container", "create", image]);
    args.extend(startup.iter().cloned());
    args
}

/// Copies the directory contents, not the directory itself.
pub(crate) fn copy_into_args(
    handle: &ContainerHandle,
    source_dir: &Path,
    container_path: &str,
) -> Vec<String> {
    vec![
        "container".to_string(),
        "cp".to_string(),
        format!("{}/.", source_dir.display()),
        format!("{}:{}", handle, container_path),
    ]
}

pub(crate) fn start_args(handle: &ContainerHandle) -> Vec<String> {
    owned(&["start", "--attach", "--interactive", handle.as_str()])
}

pub(crate) fn copy_out_args(
    handle: &ContainerHandle,
    container_path: &str,
    dest_dir: &Path,
) -> Vec<String> {
    vec![
        "container".to_string(),
        "cp".to_string(),
        format!("{}:{}", handle, container_path),
        dest_dir.display().to_string(),
    ]
}

pub(crate) fn remove_args(handle: &ContainerHandle) -> Vec<String> {
    owned(&["container", "rm", "--force", handle.as_str()])
}
