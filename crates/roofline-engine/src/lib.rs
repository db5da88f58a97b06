//! Adapter over the embedded DuckDB instance.
//!
//! One connection per process, guarded by a mutex; every other crate talks
//! to the engine through [`EngineConnection`]. Identifiers are validated
//! before interpolation, transactions commit on success and roll back on
//! any failure, and bulk file movement goes through engine-native COPY.

pub mod connection;
pub mod error;
pub mod identifier;
pub mod json;
pub mod relation;

pub use connection::EngineConnection;
pub use error::{EngineError, Result};
pub use identifier::safe_identifier;
pub use relation::{JoinKind, Relation};
