//! Core domain types and traits for mxpack.
//!
//! This crate contains:
//! - Version parsing and runtime flavor selection
//! - Source descriptors for the supported input kinds
//! - Builder image references and compiler download locations
//! - Revision identifiers and the best-effort result type
//! - The container engine trait used by the build orchestrator

pub mod engine;
pub mod error;
pub mod id;
pub mod image;
pub mod outcome;
pub mod revision;
pub mod source;
pub mod version;

pub use error::{Error, ErrorKind, Result};
pub use id::BuildId;
pub use outcome::BestEffort;
pub use revision::RevisionId;
pub use version::Version;
