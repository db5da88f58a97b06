//! Exponential backoff for transient sink failures.
//!
//! Transient I/O (search transport errors, Bolt transport errors) gets up
//! to three attempts with 1s, 2s, 4s waits. Permanent failures (mapping
//! conflicts, auth, syntax) surface immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Result, SinkError};

/// Retry policy for sink calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `base * 2^n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given 0-indexed attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.pow(attempt)
    }
}

/// Run `op` with the policy, retrying only retryable errors.
pub async fn retry_async<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    label,
                    attempt = attempt + 1,
                    max = policy.max_attempts,
                    wait_secs = delay.as_secs(),
                    error = %e,
                    "transient sink failure; backing off"
                );
                tokio::time::sleep(delay).await;
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| SinkError::GraphConfig("retry loop exhausted".to_string())))
}
