//! Sink writers: Parquet files, an Elasticsearch cluster, and a Neo4j
//! property graph.
//!
//! Each sink owns its own correctness guarantees; there are no transactions
//! across sinks. Per-record failures are counted and reported, never
//! silently dropped.

pub mod elastic;
pub mod error;
pub mod neo4j;
pub mod parquet;
pub mod retry;

pub use error::{Result, SinkError};
pub use parquet::ParquetWriter;
pub use retry::{RetryPolicy, retry_async};
