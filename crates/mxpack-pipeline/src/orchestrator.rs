//! Builder image resolution and build container lifecycle.

use std::path::PathBuf;
use std::sync::Arc;

use derive_more::Display;
use mxpack_config::BuildConfig;
use mxpack_core::engine::{ContainerEngine, ContainerHandle, ImageBuildSpec};
use mxpack_core::image::BuilderImageRef;
use mxpack_core::{BestEffort, Result, RevisionId};
use mxpack_source::archive::{TEMP_PREFIX, extract_into};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Where the project is copied inside the build container.
pub const CONTAINER_PROJECT_DIR: &str = "/workdir/project";
/// Where the build container leaves the compiled archive.
pub const CONTAINER_OUTPUT_PATH: &str = "/workdir/output.mda";
const OUTPUT_ARCHIVE: &str = "output.mda";
/// Build argument carrying the compiler tarball location.
pub const DOWNLOAD_URL_ARG: &str = "MXBUILD_DOWNLOAD_URL";

/// Step of a containerized build, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BuildStage {
    #[display("resolve-image")]
    ResolveImage,
    #[display("create-container")]
    CreateContainer,
    #[display("copy-source-in")]
    CopySourceIn,
    #[display("run-build")]
    RunBuild,
    #[display("copy-artifact-out")]
    CopyArtifactOut,
    #[display("destroy-container")]
    DestroyContainer,
    #[display("done")]
    Done,
}

/// How builder images are named, located and built.
#[derive(Debug, Clone)]
pub struct ImageSettings {
    /// Shared cache registry. Images are pulled from and pushed to it.
    pub artifacts_repository: Option<String>,
    pub local_repository: String,
    pub download_url: Url,
    pub builder_context: PathBuf,
}

impl From<&BuildConfig> for ImageSettings {
    fn from(config: &BuildConfig) -> Self {
        Self {
            artifacts_repository: config.artifacts_repository.clone(),
            local_repository: config.local_repository.clone(),
            download_url: config.download_url.clone(),
            builder_context: config.builder_context.clone(),
        }
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self::from(&BuildConfig::default())
    }
}

/// A project to compile in a builder container.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Host directory holding the project file; copied into the container.
    pub project_dir: PathBuf,
    /// Project file name, passed to the container as its first argument.
    pub project_file_name: String,
    pub image: BuilderImageRef,
    pub revision: RevisionId,
    /// Directory the compiled archive is unpacked into.
    pub destination: PathBuf,
}

/// Removes a build container exactly once.
///
/// Call [`ContainerGuard::destroy`] on every normal exit path. If the guard is
/// dropped without it, for example because the build future was dropped,
/// removal is spawned onto the current runtime.
pub struct ContainerGuard {
    engine: Arc<dyn ContainerEngine>,
    handle: Option<ContainerHandle>,
}

impl ContainerGuard {
    pub fn new(engine: Arc<dyn ContainerEngine>, handle: ContainerHandle) -> Self {
        Self {
            engine,
            handle: Some(handle),
        }
    }

    pub async fn destroy(mut self) {
        if let Some(handle) = self.handle.take() {
            remove_container(self.engine.as_ref(), &handle).await;
        }
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let engine = self.engine.clone();
                runtime.spawn(async move {
                    remove_container(engine.as_ref(), &handle).await;
                });
            }
            Err(_) => {
                warn!(container = %handle, "No runtime available, build container was not removed");
            }
        }
    }
}

async fn remove_container(engine: &dyn ContainerEngine, handle: &ContainerHandle) {
    debug!(stage = %BuildStage::DestroyContainer, container = %handle, "Build stage");
    if let Err(e) = engine.remove_container(handle).await {
        warn!(container = %handle, error = %e, "Failed to delete container");
    }
}

/// Runs one containerized compilation.
pub struct ContainerOrchestrator {
    engine: Arc<dyn ContainerEngine>,
    settings: ImageSettings,
}

impl ContainerOrchestrator {
    pub fn new(engine: Arc<dyn ContainerEngine>, settings: ImageSettings) -> Self {
        Self { engine, settings }
    }

    /// Compile the project and unpack the result into the destination.
    ///
    /// Once a container exists it is removed on every exit path, including
    /// cancellation. A removal failure is only logged.
    pub async fn build(&self, request: &BuildRequest, cancel: &CancellationToken) -> Result<()> {
        stage(BuildStage::ResolveImage);
        let image = self.resolve_image(&request.image, cancel).await?;

        stage(BuildStage::CreateContainer);
        let startup = vec![
            request.project_file_name.clone(),
            request.revision.as_str().to_string(),
        ];
        let handle = self
            .engine
            .create_container(&image, &startup, cancel)
            .await?;
        let guard = ContainerGuard::new(self.engine.clone(), handle.clone());

        let result = self.run_in_container(&handle, request, cancel).await;
        guard.destroy().await;

        if result.is_ok() {
            stage(BuildStage::Done);
        }
        result
    }

    async fn run_in_container(
        &self,
        handle: &ContainerHandle,
        request: &BuildRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        stage(BuildStage::CopySourceIn);
        self.engine
            .copy_into(handle, &request.project_dir, CONTAINER_PROJECT_DIR, cancel)
            .await?;

        stage(BuildStage::RunBuild);
        self.engine
            .start_attached(handle, cancel)
            .await?
            .into_result()?;

        stage(BuildStage::CopyArtifactOut);
        let scratch = tempfile::Builder::new().prefix(TEMP_PREFIX).tempdir()?;
        self.engine
            .copy_out(handle, CONTAINER_OUTPUT_PATH, scratch.path(), cancel)
            .await?;
        extract_into(&scratch.path().join(OUTPUT_ARCHIVE), &request.destination).await?;
        Ok(())
    }

    /// Find or produce the builder image and return its qualified name.
    ///
    /// With a cache repository the image is pulled first. If the pull fails
    /// for any reason it is built locally and pushed back; a failed push only
    /// warns.
    pub async fn resolve_image(
        &self,
        image: &BuilderImageRef,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let qualified = match &self.settings.artifacts_repository {
            Some(repository) => {
                let qualified = image.qualified(repository);
                match self.engine.pull_image(&qualified, cancel).await {
                    Ok(()) => {
                        info!(image = %qualified, "Using cached builder image");
                        return Ok(qualified);
                    }
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => {
                        info!(image = %qualified, error = %e, "Builder image not cached, building locally");
                    }
                }
                qualified
            }
            None => image.qualified(&self.settings.local_repository),
        };

        let spec = self.image_build_spec(image, &qualified)?;
        self.engine.build_image(&spec, cancel).await?;

        if self.settings.artifacts_repository.is_some() {
            let pushed = self.push_image(&qualified, cancel).await?;
            if let Some(cause) = pushed.cause() {
                warn!(
                    image = %qualified,
                    error = %cause,
                    "Failed to push mxbuild into artifacts repository; continuing with the build"
                );
            }
        }

        Ok(qualified)
    }

    /// Build definition for `image`, tagged as `qualified`.
    pub fn image_build_spec(&self, image: &BuilderImageRef, qualified: &str) -> Result<ImageBuildSpec> {
        let download_url = image.download_url(&self.settings.download_url)?;
        let context = self.settings.builder_context.clone();
        Ok(ImageBuildSpec {
            image: qualified.to_string(),
            dockerfile: context.join(image.flavor.dockerfile_name()),
            context,
            build_args: vec![(DOWNLOAD_URL_ARG.to_string(), download_url.to_string())],
        })
    }

    /// Push is best-effort; only cancellation escapes.
    async fn push_image(&self, image: &str, cancel: &CancellationToken) -> Result<BestEffort<()>> {
        match self.engine.push_image(image, cancel).await {
            Err(e) if e.is_cancelled() => Err(e),
            result => Ok(BestEffort::or_fallback(result, ())),
        }
    }
}

fn stage(stage: BuildStage) {
    info!(stage = %stage, "Build stage");
}
