//! KDL configuration parsing for mxpack.
//!
//! This crate handles parsing of the build configuration (`mxpack.kdl`):
//! container engine preference, builder image caching, compiler download
//! location, deployment scaffolding and offline prefetch settings.

pub mod settings;
pub mod error;

pub use settings::{BuildConfig, PrefetchConfig, load_build_config, parse_build_config};
pub use error::{ConfigError, ConfigResult};
