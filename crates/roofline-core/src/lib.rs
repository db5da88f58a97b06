//! Core types for the Roofline medallion pipeline.
//!
//! This crate holds everything the stage crates share but that owns no I/O:
//! - [`config`]: the settings tree (programmatic construction + env overrides)
//! - [`catalog`]: canonical table names for every entity × layer
//! - [`metadata`]: frozen, constructor-validated stage metadata
//! - [`metrics`]: stage / entity / pipeline metrics with derived rates
//! - [`normalize`]: state, county, ZIP, and hierarchical-ID canonicalization

pub mod catalog;
pub mod config;
pub mod error;
pub mod metadata;
pub mod metrics;
pub mod normalize;

pub use catalog::{EntityKind, TableCatalog};
pub use config::PipelineSettings;
pub use error::{CoreError, Result};
