//! Build orchestration for mxpack.
//!
//! Ties input resolution, the builder container lifecycle and destination
//! preparation into one run, and populates the offline download cache.

pub mod orchestrator;
pub mod pipeline;
pub mod prefetch;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::{BuildRequest, BuildStage, ContainerGuard, ContainerOrchestrator, ImageSettings};
pub use pipeline::Pipeline;
pub use prefetch::{FetchOutcome, PrefetchError, PrefetchReport, Prefetcher};
