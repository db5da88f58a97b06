//! The medallion refinement engine.
//!
//! Data flows Bronze → Silver → Gold inside the embedded engine, then fans
//! out to the sink writers. Stage ordering rules live in
//! [`orchestrator::PipelineOrchestrator`]:
//!
//! 1. Location Bronze before Neighborhood/Property Silver
//! 2. Location Silver before Neighborhood Silver
//! 3. Neighborhood Silver before Wikipedia Silver
//! 4. All Silver before any Gold
//! 5. All Gold before the graph builder and every sink writer

pub mod bronze;
pub mod error;
pub mod gold;
pub mod graph;
pub mod orchestrator;
pub mod silver;

#[cfg(test)]
pub(crate) mod tests_support;

pub use error::{PipelineError, Result};
pub use orchestrator::{PipelineOrchestrator, RunOptions};
