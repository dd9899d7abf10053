//! Test doubles and fixtures shared by the orchestrator and pipeline tests.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use mxpack_core::engine::{BuildOutcome, ContainerEngine, ContainerHandle, ImageBuildSpec};
use mxpack_core::{Error, Result};
pub(crate) use mxpack_source::fixtures::{write_project_file, write_scaffold, write_zip};
use tokio_util::sync::CancellationToken;

/// In-memory engine that records every call.
pub(crate) struct FakeEngine {
    pub(crate) calls: Mutex<Vec<String>>,
    pub fail_pull: bool,
    pub fail_build_image: bool,
    pub fail_push: bool,
    pub build_exit: i32,
    /// `start_attached` blocks until the token fires.
    pub hang_on_start: bool,
    /// Entries written into `output.mda` by `copy_out`.
    pub artifact: Vec<(&'static str, &'static str)>,
}

impl FakeEngine {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_pull: false,
            fail_build_image: false,
            fail_push: false,
            build_exit: 0,
            hang_on_start: false,
            artifact: vec![("model/metadata.json", "{\"Constants\": []}")],
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, verb: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split_whitespace().next() == Some(verb))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    fn name(&self) -> String {
        "fake".to_string()
    }

    async fn pull_image(&self, image: &str, _cancel: &CancellationToken) -> Result<()> {
        self.record(format!("pull {}", image));
        if self.fail_pull {
            return Err(Error::BuildFailed {
                code: Some(125),
                last_stderr: Some("manifest unknown".to_string()),
            });
        }
        Ok(())
    }

    async fn build_image(&self, spec: &ImageBuildSpec, _cancel: &CancellationToken) -> Result<()> {
        let args: Vec<String> = spec
            .build_args
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        self.record(format!(
            "build {} {} {}",
            spec.image,
            spec.dockerfile.display(),
            args.join(" ")
        ));
        if self.fail_build_image {
            return Err(Error::BuildFailed {
                code: Some(1),
                last_stderr: Some("download failed".to_string()),
            });
        }
        Ok(())
    }

    async fn push_image(&self, image: &str, _cancel: &CancellationToken) -> Result<()> {
        self.record(format!("push {}", image));
        if self.fail_push {
            return Err(Error::BuildFailed {
                code: Some(1),
                last_stderr: Some("denied: requested access to the resource is denied".to_string()),
            });
        }
        Ok(())
    }

    async fn create_container(
        &self,
        image: &str,
        args: &[String],
        _cancel: &CancellationToken,
    ) -> Result<ContainerHandle> {
        self.record(format!("create {} {}", image, args.join(" ")));
        Ok(ContainerHandle::new("fake-container"))
    }

    async fn copy_into(
        &self,
        handle: &ContainerHandle,
        source_dir: &Path,
        container_path: &str,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.record(format!(
            "copy_into {} {} {}",
            handle,
            source_dir.display(),
            container_path
        ));
        Ok(())
    }

    async fn start_attached(
        &self,
        handle: &ContainerHandle,
        cancel: &CancellationToken,
    ) -> Result<BuildOutcome> {
        self.record(format!("start {}", handle));
        if self.hang_on_start {
            cancel.cancelled().await;
            return Err(Error::Cancelled);
        }
        Ok(BuildOutcome {
            exit_code: Some(self.build_exit),
            last_stdout: None,
            last_stderr: Some("MxBuild finished".to_string()),
        })
    }

    async fn copy_out(
        &self,
        handle: &ContainerHandle,
        container_path: &str,
        dest_dir: &Path,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.record(format!("copy_out {} {}", handle, container_path));
        write_zip(&dest_dir.join("output.mda"), &self.artifact);
        Ok(())
    }

    async fn remove_container(&self, handle: &ContainerHandle) -> Result<()> {
        self.record(format!("remove {}", handle));
        Ok(())
    }
}
