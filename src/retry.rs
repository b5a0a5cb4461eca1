//! Exponential backoff for transient sync failures.
//!
//! The sync client never retries on its own. Callers that want inline retries
//! wrap `write` or `delete` in [`RetryPolicy::execute`]; only errors for which
//! [`SyncError::is_retryable`] holds are retried.

use crate::error::{SyncError, SyncResult};
use log::{debug, warn};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

/// Retry policy configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    #[serde(with = "millis")]
    pub base_delay: Duration,
    /// Maximum delay cap, also applied to directory-requested delays.
    #[serde(with = "millis")]
    pub max_delay: Duration,
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn should_retry(&self, attempt: u32, error: &SyncError) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }

    /// Delay before retry number `attempt + 1`.
    ///
    /// A `Retry-After` reported by the directory is used as-is (capped);
    /// otherwise `min(base_delay * 2^attempt, max_delay)`.
    pub fn delay_for(&self, attempt: u32, error: &SyncError) -> Duration {
        match error.retry_after() {
            Some(requested) => requested.min(self.max_delay),
            None => self
                .base_delay
                .saturating_mul(2u32.saturating_pow(attempt))
                .min(self.max_delay),
        }
    }

    /// Run `f` until it succeeds, fails permanently or retries run out.
    ///
    /// The last error is returned unchanged when retries are exhausted.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut f: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("{} succeeded after {} attempt(s)", operation_name, attempt + 1);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.should_retry(attempt, &error) {
                        if error.is_retryable() {
                            warn!(
                                "{} failed after {} attempt(s): {}",
                                operation_name,
                                attempt + 1,
                                error
                            );
                        }
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt, &error);
                    debug!(
                        "Retrying {} in {:?} (attempt {}/{}): {}",
                        operation_name,
                        delay,
                        attempt + 1,
                        self.max_retries,
                        error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
