//! Silver layer: one standardized, materialized table per entity.
//!
//! Every transformer is a single relation pipeline (filter → project →
//! embed-join → create). Embedding attachment is shared: the projection is
//! staged, embedding texts are sent through the configured provider in
//! batches, and the vectors are joined back on the primary key. With no
//! provider configured the embedding columns materialize as nulls and the
//! run continues.

pub mod extensions;
pub mod location;
pub mod neighborhood;
pub mod property;
pub mod wikipedia;

use chrono::Utc;
use duckdb::types::Value;
use tracing::{info, warn};

use roofline_embed::EmbeddingGenerator;
use roofline_engine::{EngineConnection, Relation, safe_identifier};

use crate::error::{PipelineError, Result};

pub use extensions::SilverGraphExtensions;
pub use location::LocationSilverTransformer;
pub use neighborhood::NeighborhoodSilverTransformer;
pub use property::PropertySilverTransformer;
pub use wikipedia::WikipediaSilverTransformer;

/// Primary key used to join embeddings back onto the staging table.
#[derive(Debug, Clone, Copy)]
pub(crate) enum IdColumn {
    Text(&'static str),
    BigInt(&'static str),
}

impl IdColumn {
    const fn name(self) -> &'static str {
        match self {
            Self::Text(name) | Self::BigInt(name) => name,
        }
    }

    const fn sql_type(self) -> &'static str {
        match self {
            Self::Text(_) => "VARCHAR",
            Self::BigInt(_) => "BIGINT",
        }
    }
}

fn sql_text_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn id_literal(value: &Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(sql_text_literal(s)),
        Value::BigInt(v) => Some(v.to_string()),
        Value::Int(v) => Some(v.to_string()),
        Value::SmallInt(v) => Some(v.to_string()),
        Value::UBigInt(v) => Some(v.to_string()),
        Value::UInt(v) => Some(v.to_string()),
        _ => None,
    }
}

fn vector_literal(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 10 + 16);
    out.push('[');
    for (i, v) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&format!("{v}"));
    }
    out.push_str("]::DOUBLE[]");
    out
}

/// Materialize a staged projection as the Silver output table, attaching
/// embeddings when a generator is available.
///
/// `dedup_window` is an optional `PARTITION BY … ORDER BY …` clause; rows
/// ranked first in their partition survive.
///
/// Returns the embedding pass metadata, `None` when no provider is
/// configured.
pub(crate) async fn materialize_with_embeddings(
    engine: &EngineConnection,
    embedder: Option<&EmbeddingGenerator>,
    transformed: Relation,
    output_table: &str,
    entity: roofline_core::catalog::EntityKind,
    id: IdColumn,
    dedup_window: Option<&str>,
) -> Result<Option<roofline_core::metadata::EmbeddingMetadata>> {
    let output = safe_identifier(output_table)?.to_string();
    let staging = format!("{output}_staging");
    let embeddings_table = format!("{output}_embeddings");

    engine.drop_table(&staging)?;
    engine.drop_table(&embeddings_table)?;
    engine.drop_table(&output)?;
    transformed.create(engine, &staging)?;

    let mut embedding_meta = None;
    let joined_sql = if let Some(embedder) = embedder {
        let id_name = id.name();
        let rows: Vec<(Value, String)> = engine.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {id_name}, embedding_text FROM {staging} ORDER BY {id_name}"
            ))?;
            let mapped = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, Value>(0)?,
                    row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                ))
            })?;
            mapped.collect::<duckdb::Result<Vec<_>>>()
        })?;

        let texts: Vec<String> = rows.iter().map(|(_, text)| text.clone()).collect();
        let batch = embedder.embed_all(&texts).await?;

        engine.execute_batch(&format!(
            "CREATE TABLE {embeddings_table} ( \
                 {id_name} {}, \
                 embedding_vector DOUBLE[], \
                 embedding_generated_at TIMESTAMP)",
            id.sql_type()
        ))?;

        let generated_at = Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        let mut values = Vec::new();
        for ((id_value, _), vector) in rows.iter().zip(batch.vectors.iter()) {
            let (Some(id_lit), Some(vector)) = (id_literal(id_value), vector.as_ref()) else {
                continue;
            };
            values.push(format!(
                "({id_lit}, {}, TIMESTAMP '{generated_at}')",
                vector_literal(vector)
            ));
        }
        for chunk in values.chunks(200) {
            engine.execute_batch(&format!(
                "INSERT INTO {embeddings_table} VALUES {}",
                chunk.join(", ")
            ))?;
        }

        info!(
            table = output.as_str(),
            generated = batch.generated_count(),
            model = batch.model_name.as_str(),
            "embeddings attached"
        );
        embedding_meta = Some(roofline_core::metadata::EmbeddingMetadata::new(
            entity,
            output.as_str(),
            rows.len() as u64,
            batch.generated_count(),
            batch.skipped_count(),
            batch.dimension,
            batch.model_name.clone(),
        )?);

        format!(
            "SELECT s.*, e.embedding_vector, e.embedding_generated_at \
             FROM {staging} AS s LEFT JOIN {embeddings_table} AS e \
             ON s.{id_name} = e.{id_name}"
        )
    } else {
        warn!(table = output.as_str(), "no embedding provider; embedding columns left null");
        format!(
            "SELECT s.*, CAST(NULL AS DOUBLE[]) AS embedding_vector, \
             CAST(NULL AS TIMESTAMP) AS embedding_generated_at \
             FROM {staging} AS s"
        )
    };

    let final_sql = match dedup_window {
        Some(window) => format!(
            "WITH ranked AS ( \
                 SELECT *, ROW_NUMBER() OVER ({window}) AS rn FROM ({joined_sql})) \
             SELECT * EXCLUDE (rn) FROM ranked WHERE rn = 1"
        ),
        None => joined_sql,
    };
    engine.execute_batch(&format!("CREATE TABLE {output} AS {final_sql}"))?;

    engine.drop_table(&staging)?;
    engine.drop_table(&embeddings_table)?;
    Ok(embedding_meta)
}

/// Post-transform invariant: a column must be non-null on every row.
pub(crate) fn check_non_null(
    engine: &EngineConnection,
    table: &str,
    column_expr: &str,
) -> Result<()> {
    let table_ident = safe_identifier(table)?;
    let nulls = engine.query_i64(&format!(
        "SELECT COUNT(*) FROM {table_ident} WHERE {column_expr} IS NULL"
    ))?;
    if nulls > 0 {
        return Err(PipelineError::InvariantViolated {
            table: table.to_string(),
            message: format!("{nulls} null values in {column_expr}"),
        });
    }
    Ok(())
}

/// Post-transform invariant: state values are two uppercase letters when
/// present.
pub(crate) fn check_state_codes(
    engine: &EngineConnection,
    table: &str,
    column_expr: &str,
) -> Result<()> {
    let table_ident = safe_identifier(table)?;
    let bad = engine.query_i64(&format!(
        "SELECT COUNT(*) FROM {table_ident} \
         WHERE {column_expr} IS NOT NULL AND NOT regexp_matches({column_expr}, '^[A-Z]{{2}}$')"
    ))?;
    if bad > 0 {
        return Err(PipelineError::InvariantViolated {
            table: table.to_string(),
            message: format!("{bad} values in {column_expr} are not two-letter state codes"),
        });
    }
    Ok(())
}
