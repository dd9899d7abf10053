//! Error types for mxpack.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("more than one {extension} file found in {}, can not continue", .dir.display())]
    AmbiguousInput { extension: String, dir: PathBuf },

    #[error("no supported files found in source path {}", .0.display())]
    UnsupportedInput(PathBuf),

    #[error("deployment metadata not found in {}", .0.display())]
    MissingMetadata(PathBuf),

    #[error("invalid version {input:?}: {message}")]
    InvalidVersion { input: String, message: String },

    #[error("cannot build download URL from {base}: {message}")]
    InvalidUrl { base: String, message: String },

    #[error("project database error: {0}")]
    ProjectDatabase(String),

    #[error("cannot find any container engine on PATH (tried {0})")]
    EngineNotFound(String),

    #[error("builder returned with error: {}", .last_stderr.as_deref().unwrap_or("<no output>"))]
    BuildFailed {
        code: Option<i32>,
        last_stderr: Option<String>,
    },

    #[error("container engine error: {0}")]
    Engine(String),

    #[error("revision lookup failed: {0}")]
    Revision(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad classification used for reporting and exit handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or unsupported input. Never retried.
    Configuration,
    /// The host lacks something the build needs.
    Environment,
    /// The external build tool failed.
    Build,
    /// The run was interrupted.
    Interrupted,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AmbiguousInput { .. }
            | Error::UnsupportedInput(_)
            | Error::MissingMetadata(_)
            | Error::InvalidVersion { .. }
            | Error::InvalidUrl { .. }
            | Error::ProjectDatabase(_) => ErrorKind::Configuration,
            Error::EngineNotFound(_) => ErrorKind::Environment,
            Error::BuildFailed { .. } | Error::Engine(_) => ErrorKind::Build,
            Error::Cancelled => ErrorKind::Interrupted,
            Error::Revision(_) | Error::Archive(_) | Error::Io(_) => ErrorKind::Internal,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
