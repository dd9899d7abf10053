//! Builder image references and compiler artifact locations.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result, Version};

/// First product version built with the managed (.NET) runtime.
pub const MANAGED_RUNTIME_CUTOFF: [u64; 4] = [9, 22, 0, 0];

/// Runtime the external compiler runs on inside the builder image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeFlavor {
    /// Modern managed runtime.
    #[display("dotnet")]
    Dotnet,
    /// Legacy runtime for older product versions.
    #[display("mono")]
    Mono,
}

impl RuntimeFlavor {
    pub fn for_version(version: &Version) -> Self {
        if *version >= Version::new(MANAGED_RUNTIME_CUTOFF) {
            RuntimeFlavor::Dotnet
        } else {
            RuntimeFlavor::Mono
        }
    }

    /// Name of the build definition for this flavor inside the builder context.
    pub fn dockerfile_name(&self) -> String {
        format!("{self}.dockerfile")
    }
}

/// Architecture name of the machine running the build.
pub fn host_arch() -> &'static str {
    std::env::consts::ARCH
}

fn is_arm(arch: &str) -> bool {
    matches!(arch, "arm64" | "aarch64")
}

/// A version, flavor and architecture pinned builder image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuilderImageRef {
    /// Product version exactly as read from the project.
    pub version: String,
    pub flavor: RuntimeFlavor,
    pub arch: String,
}

impl BuilderImageRef {
    pub fn new(version: impl Into<String>, flavor: RuntimeFlavor, arch: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            flavor,
            arch: arch.into(),
        }
    }

    /// Parse the version and pick the flavor from it.
    pub fn for_version(version: &str, arch: impl Into<String>) -> Result<Self> {
        let parsed: Version = version.parse()?;
        Ok(Self::new(version, RuntimeFlavor::for_version(&parsed), arch))
    }

    /// Deterministic tag, identical across builds and machines for equal inputs.
    pub fn tag(&self) -> String {
        format!("mxbuild-{}-{}-{}", self.version, self.flavor, self.arch)
    }

    /// Tag qualified by a repository address, e.g. `registry/mxbuild:<tag>`.
    pub fn qualified(&self, repository: &str) -> String {
        format!("{}:{}", repository, self.tag())
    }

    /// File name of the compiler tarball for this image.
    pub fn artifact_file_name(&self) -> String {
        let prefix = if self.flavor == RuntimeFlavor::Dotnet && is_arm(&self.arch) {
            "arm64-"
        } else {
            ""
        };
        format!("{}mxbuild-{}.tar.gz", prefix, self.version)
    }

    pub fn download_url(&self, base: &Url) -> Result<Url> {
        base.join(&self.artifact_file_name())
            .map_err(|e| Error::InvalidUrl {
                base: base.to_string(),
                message: e.to_string(),
            })
    }
}
