//! Elasticsearch writer.
//!
//! A unified writer composed of three entity writers. Each one runs its
//! Gold SELECT exactly once, walks the rows in fixed-size batches,
//! transforms every row into a typed document (validation failures are
//! counted and skipped), and submits each batch through the bulk API with
//! per-record errors collected rather than raised.

pub mod documents;

use std::time::Instant;

use elasticsearch::auth::Credentials;
use elasticsearch::http::request::JsonBody;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::http::Url;
use elasticsearch::{BulkParts, Elasticsearch};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};

use roofline_core::config::ElasticsearchSettings;
use roofline_engine::EngineConnection;

use crate::error::{Result, SinkError};
use crate::retry::{RetryPolicy, retry_async};

use documents::{NeighborhoodDocument, PropertyDocument, WikipediaDocument};

/// Batch size for property and neighborhood documents.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Wikipedia documents are large; use smaller batches.
pub const WIKIPEDIA_BATCH_SIZE: usize = 50;

/// How many per-record failures to log before going quiet.
const LOGGED_FAILURES: usize = 3;

/// Statistics for one index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub index: String,
    pub indexed: u64,
    pub errors: u64,
    pub validation_errors: u64,
    pub duration_seconds: f64,
}

/// Statistics for a full export.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchExportStats {
    pub indexes: Vec<IndexStats>,
}

impl SearchExportStats {
    #[must_use]
    pub fn total_indexed(&self) -> u64 {
        self.indexes.iter().map(|s| s.indexed).sum()
    }
}

/// Unified writer over the three entity indexes.
pub struct SearchWriter {
    engine: EngineConnection,
    client: Elasticsearch,
}

impl SearchWriter {
    /// Build a client, ping once, and fail fast if the cluster is
    /// unreachable. Basic auth is used when `ES_USERNAME`/`ES_PASSWORD`
    /// are set.
    pub async fn connect(
        engine: EngineConnection,
        settings: &ElasticsearchSettings,
    ) -> Result<Self> {
        let url = Url::parse(&settings.url())
            .map_err(|e| SinkError::SearchUnreachable(e.to_string()))?;
        let mut builder = TransportBuilder::new(SingleNodeConnectionPool::new(url))
            .timeout(std::time::Duration::from_secs(settings.timeout));
        if let Some((user, password)) = ElasticsearchSettings::credentials() {
            builder = builder.auth(Credentials::Basic(user, password));
        }
        let transport = builder
            .build()
            .map_err(|e| SinkError::SearchUnreachable(e.to_string()))?;
        let client = Elasticsearch::new(transport);

        let ping = client.ping().send().await?;
        if !ping.status_code().is_success() {
            return Err(SinkError::SearchUnreachable(format!(
                "ping returned {}",
                ping.status_code()
            )));
        }
        info!(host = %settings.host, port = settings.port, "search cluster reachable");

        Ok(Self { engine, client })
    }

    /// Index Gold properties into the `properties` index.
    pub async fn index_properties(&self) -> Result<IndexStats> {
        self.index_table(
            "SELECT * FROM gold_properties",
            "properties",
            DEFAULT_BATCH_SIZE,
            |row| PropertyDocument::from_row(row).map(|d| (d.listing_id.clone(), json!(d))),
        )
        .await
    }

    /// Index Gold neighborhoods into the `neighborhoods` index.
    pub async fn index_neighborhoods(&self) -> Result<IndexStats> {
        self.index_table(
            "SELECT * FROM gold_neighborhoods",
            "neighborhoods",
            DEFAULT_BATCH_SIZE,
            |row| {
                NeighborhoodDocument::from_row(row).map(|d| (d.neighborhood_id.clone(), json!(d)))
            },
        )
        .await
    }

    /// Index Gold Wikipedia articles into the `wikipedia` index.
    pub async fn index_wikipedia(&self) -> Result<IndexStats> {
        self.index_table(
            "SELECT * FROM gold_wikipedia",
            "wikipedia",
            WIKIPEDIA_BATCH_SIZE,
            |row| WikipediaDocument::from_row(row).map(|d| (d.page_id.to_string(), json!(d))),
        )
        .await
    }

    /// Index all three entities.
    pub async fn index_all(&self) -> Result<SearchExportStats> {
        let mut stats = SearchExportStats::default();
        stats.indexes.push(self.index_properties().await?);
        stats.indexes.push(self.index_neighborhoods().await?);
        stats.indexes.push(self.index_wikipedia().await?);
        info!(total = stats.total_indexed(), "search export complete");
        Ok(stats)
    }

    /// Shared indexing loop: one SELECT, fixed-size batches, typed
    /// transform, bulk submit with collected errors.
    async fn index_table(
        &self,
        sql: &str,
        index: &str,
        batch_size: usize,
        transform: impl Fn(&Map<String, Value>) -> std::result::Result<(String, Value), String>,
    ) -> Result<IndexStats> {
        let started = Instant::now();
        let rows = self.engine.query_json(sql)?;
        info!(index, rows = rows.len(), "starting indexing");

        let mut indexed = 0u64;
        let mut errors = 0u64;
        let mut validation_errors = 0u64;

        for batch in rows.chunks(batch_size.max(1)) {
            let mut actions: Vec<(String, Value)> = Vec::with_capacity(batch.len());
            for row in batch {
                match transform(row) {
                    Ok(action) => actions.push(action),
                    Err(message) => {
                        if validation_errors < LOGGED_FAILURES as u64 {
                            error!(index, %message, "document validation failed");
                        }
                        validation_errors += 1;
                    }
                }
            }
            if actions.is_empty() {
                continue;
            }

            // Transport failures are transient and retried; a non-success
            // bulk status is permanent and aborts the stage.
            let payload: Value = retry_async(RetryPolicy::default(), index, || async {
                let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(actions.len() * 2);
                for (id, doc) in &actions {
                    body.push(json!({ "index": { "_index": index, "_id": id } }).into());
                    body.push(doc.clone().into());
                }
                let response =
                    self.client.bulk(BulkParts::Index(index)).body(body).send().await?;
                let status = response.status_code();
                if !status.is_success() {
                    return Err(SinkError::BulkFailed {
                        index: index.to_string(),
                        message: format!("bulk call returned {status}"),
                    });
                }
                Ok(response.json().await?)
            })
            .await?;
            let (ok, failed) = count_bulk_results(&payload);
            indexed += ok;
            if failed > 0 {
                errors += failed;
                for item in first_failures(&payload, LOGGED_FAILURES) {
                    error!(index, failure = %item, "indexing failure");
                }
            }

            if indexed > 0 && indexed % 1000 == 0 {
                info!(index, indexed, "indexing progress");
            }
        }

        let duration_seconds = started.elapsed().as_secs_f64();
        if errors > 0 || validation_errors > 0 {
            warn!(index, errors, validation_errors, "indexing finished with failures");
        }
        info!(index, indexed, "completed indexing");

        Ok(IndexStats {
            index: index.to_string(),
            indexed,
            errors,
            validation_errors,
            duration_seconds,
        })
    }
}

/// Count succeeded and failed items in a bulk response body.
fn count_bulk_results(payload: &Value) -> (u64, u64) {
    let Some(items) = payload.get("items").and_then(Value::as_array) else {
        return (0, 0);
    };
    let mut ok = 0u64;
    let mut failed = 0u64;
    for item in items {
        let entry = item.get("index").or_else(|| item.get("create"));
        let has_error = entry.and_then(|e| e.get("error")).is_some();
        if has_error {
            failed += 1;
        } else {
            ok += 1;
        }
    }
    (ok, failed)
}

/// First `n` error payloads from a bulk response, rendered for logging.
fn first_failures(payload: &Value, n: usize) -> Vec<String> {
    payload
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    item.get("index")
                        .or_else(|| item.get("create"))
                        .and_then(|e| e.get("error"))
                        .map(std::string::ToString::to_string)
                })
                .take(n)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_counting_separates_errors() {
        let payload = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "a", "status": 201 } },
                { "index": { "_id": "b", "status": 400, "error": { "type": "mapper_parsing_exception" } } },
                { "index": { "_id": "c", "status": 201 } },
            ]
        });
        assert_eq!(count_bulk_results(&payload), (2, 1));
        let failures = first_failures(&payload, 3);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("mapper_parsing_exception"));
    }

    #[test]
    fn bulk_counting_handles_missing_items() {
        assert_eq!(count_bulk_results(&json!({})), (0, 0));
        assert!(first_failures(&json!({}), 3).is_empty());
    }
}
