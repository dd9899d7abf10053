//! End-to-end build of a deployment directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mxpack_config::BuildConfig;
use mxpack_core::engine::ContainerEngine;
use mxpack_core::image::{BuilderImageRef, host_arch};
use mxpack_core::source::SourceKind;
use mxpack_core::{BuildId, Error, Result};
use mxpack_source::fs::copy_dir_all;
use mxpack_source::{
    ResolvedSource, Scaffold, extract_into, prepare_destination, read_product_version,
    resolve_revision, resolve_source, verify_metadata,
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span};

use crate::orchestrator::{BuildRequest, ContainerOrchestrator, ImageSettings};

/// Turns any supported input into a ready-to-package deployment directory.
pub struct Pipeline {
    engine: Arc<dyn ContainerEngine>,
    config: BuildConfig,
}

impl Pipeline {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: BuildConfig) -> Self {
        Self { engine, config }
    }

    /// Build `source` into `destination` and return the `project/` directory.
    ///
    /// The destination is reset first. Input detection completes before any
    /// engine call, so an ambiguous input never starts a container.
    pub async fn run(
        &self,
        source: &Path,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let id = BuildId::new();
        let span = info_span!("build", id = %id);
        self.run_inner(source, destination, cancel)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        source: &Path,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        info!(source = %source.display(), dest = %destination.display(), "Starting build");
        let scaffold = Scaffold::from_root(&self.config.scaffold_dir);
        let project_dir = prepare_destination(destination, &scaffold).await?;

        let resolved = resolve_source(source).await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match resolved.kind() {
            SourceKind::RawProject | SourceKind::PackedProject => {
                self.compile(&resolved, &project_dir, cancel).await?;
            }
            SourceKind::DeploymentArchive => {
                extract_into(resolved.path(), &project_dir).await?;
            }
            SourceKind::UnpackedDeployment => {
                copy_dir_all(resolved.path(), &project_dir).await?;
            }
        }
        drop(resolved);

        verify_metadata(&project_dir).await?;
        info!(project = %project_dir.display(), "Deployment directory ready");
        Ok(project_dir)
    }

    async fn compile(
        &self,
        resolved: &ResolvedSource,
        project_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let project_file = resolved.path();
        let source_dir = resolved
            .project_dir()
            .ok_or_else(|| Error::UnsupportedInput(project_file.to_path_buf()))?;
        let project_file_name = project_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::UnsupportedInput(project_file.to_path_buf()))?;

        let version = read_product_version(project_file).await?;
        let arch = self
            .config
            .platform_arch
            .clone()
            .unwrap_or_else(|| host_arch().to_string());
        let image = BuilderImageRef::for_version(&version, arch)?;
        info!(
            version = %version,
            flavor = %image.flavor,
            engine = %self.engine.name(),
            "Detected product version"
        );

        let revision = resolve_revision(&source_dir).await.into_value();

        let request = BuildRequest {
            project_dir: source_dir,
            project_file_name,
            image,
            revision,
            destination: project_dir.to_path_buf(),
        };
        ContainerOrchestrator::new(self.engine.clone(), ImageSettings::from(&self.config))
            .build(&request, cancel)
            .await
    }
}
