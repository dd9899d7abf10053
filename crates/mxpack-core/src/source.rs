//! Input source descriptors.

use std::path::PathBuf;

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Extension of a packed project archive.
pub const PACKED_PROJECT_EXT: &str = ".mpk";
/// Extension of a project database file.
pub const PROJECT_FILE_EXT: &str = ".mpr";
/// Extension of a deployment archive (also the packed model format).
pub const DEPLOYMENT_ARCHIVE_EXT: &str = ".mda";

/// Kind of input the pipeline was handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// A project directory with a `.mpr` database.
    #[display("raw-project")]
    RawProject,
    /// A `.mpr` project found inside an extracted `.mpk` archive.
    #[display("packed-project")]
    PackedProject,
    /// A compiled `.mda` archive.
    #[display("deployment-archive")]
    DeploymentArchive,
    /// A directory already holding an unpacked deployment.
    #[display("unpacked-deployment")]
    UnpackedDeployment,
}

impl SourceKind {
    /// Whether this kind has to go through the builder container.
    pub fn needs_compilation(&self) -> bool {
        matches!(self, SourceKind::RawProject | SourceKind::PackedProject)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    /// The project file, archive, or directory the kind refers to.
    pub path: PathBuf,
}

impl SourceDescriptor {
    pub fn new(kind: SourceKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}
