//! Container engine process execution for mxpack.
//!
//! Provides:
//! - [`ProcessStreamer`], which locates an engine binary and streams both of
//!   its output pipes into the log
//! - [`CliEngine`], a [`ContainerEngine`] that drives `podman` or `docker`
//!   through their command line

pub mod engine;
pub mod process;

pub use engine::CliEngine;
pub use mxpack_core::engine::{BuildOutcome, ContainerEngine, ContainerHandle, LogLine, LogStream};
pub use process::{EngineBinary, ProcessStreamer};
