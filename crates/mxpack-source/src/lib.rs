//! Input resolution and destination preparation for mxpack.
//!
//! Everything here touches the local filesystem only:
//! - locating the single input file of a kind and unpacking archives
//! - reading the product version out of a project database
//! - resolving the version-control revision of a project tree
//! - resetting and seeding the output directory

pub mod archive;
pub mod destination;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;
pub mod fs;
pub mod metadata;
pub mod project;
pub mod resolve;
pub mod revision;

pub use archive::{extract_into, extract_to_temp, find_default_file};
pub use destination::{Scaffold, prepare_destination};
pub use metadata::verify_metadata;
pub use project::read_product_version;
pub use resolve::{ResolvedSource, resolve_source};
pub use revision::{read_revision, resolve_revision};
