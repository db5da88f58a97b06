//! Query execution with exponential-backoff retries.
//!
//! Transient failures (connection timeouts, transport errors) are retried
//! up to three times with 2^attempt-second waits. Permanent failures
//! (query syntax, missing index) surface immediately.

use std::time::{Duration, Instant};

use elasticsearch::{Elasticsearch, SearchParts};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Result, SearchError};

/// Attempts before giving up on transient failures.
pub const MAX_RETRIES: u32 = 3;

/// Timing and retry details for one execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionMetrics {
    pub execution_time_ms: u64,
    pub retry_count: u32,
}

/// Executes search bodies against one index.
pub struct SearchExecutor {
    client: Elasticsearch,
    index: String,
    max_retries: u32,
}

impl SearchExecutor {
    #[must_use]
    pub fn new(client: Elasticsearch, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
            max_retries: MAX_RETRIES,
        }
    }

    /// Run a query body, retrying transient failures.
    pub async fn execute(&self, body: &Value) -> Result<(Value, ExecutionMetrics)> {
        let started = Instant::now();
        let mut retry_count = 0;

        for attempt in 0..self.max_retries {
            match self.send(body).await {
                Ok(response) => {
                    let metrics = ExecutionMetrics {
                        execution_time_ms: u64::try_from(started.elapsed().as_millis())
                            .unwrap_or(u64::MAX),
                        retry_count,
                    };
                    return Ok((response, metrics));
                }
                Err(e) if e.is_retryable() && attempt + 1 < self.max_retries => {
                    retry_count = attempt + 1;
                    let wait = Duration::from_secs(2u64.pow(attempt));
                    warn!(
                        attempt = attempt + 1,
                        max = self.max_retries,
                        wait_secs = wait.as_secs(),
                        error = %e,
                        "transient search failure; backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) if e.is_retryable() => {
                    return Err(SearchError::RetriesExhausted {
                        attempts: self.max_retries,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Err(SearchError::RetriesExhausted {
            attempts: self.max_retries,
            message: "no attempts were made".to_string(),
        })
    }

    async fn send(&self, body: &Value) -> Result<Value> {
        let response = self
            .client
            .search(SearchParts::Index(&[self.index.as_str()]))
            .body(body.clone())
            .send()
            .await?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(SearchError::IndexMissing(self.index.clone()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SearchError::Query {
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: Value = response.json().await?;
        info!(
            index = self.index.as_str(),
            took = payload.get("took").and_then(serde_json::Value::as_u64).unwrap_or(0),
            "search executed"
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_is_powers_of_two_seconds() {
        let waits: Vec<u64> = (0..MAX_RETRIES - 1)
            .map(|attempt| Duration::from_secs(2u64.pow(attempt)).as_secs())
            .collect();
        assert_eq!(waits, vec![1, 2]);
    }

    #[test]
    fn query_errors_carry_status_and_body() {
        let err = SearchError::Query {
            status: 400,
            body: "x_content_parse_exception".into(),
        };
        assert!(err.to_string().contains("400"));
        assert!(!err.is_retryable());
    }
}
