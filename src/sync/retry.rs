/*!
 * Retry logic with optional exponential backoff
 *
 * Uploads are never retried by the uploader itself; a caller opts in by
 * configuring `retry.attempts`. Only transport-level failures are retried.
 */

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;
use crate::repository::RepositoryError;

use super::uploader::UploadError;

/// Errors that can say whether another attempt might succeed
pub trait Retriable {
    fn is_retriable(&self) -> bool;
}

impl Retriable for UploadError {
    fn is_retriable(&self) -> bool {
        UploadError::is_retriable(self)
    }
}

impl Retriable for RepositoryError {
    fn is_retriable(&self) -> bool {
        RepositoryError::is_retriable(self)
    }
}

/// How many times to retry and how long to wait between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub attempts: u32,
    pub delay: Duration,
    pub exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub fn none() -> Self {
        Self {
            attempts: 0,
            delay: Duration::ZERO,
            exponential_backoff: false,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts,
            delay: Duration::from_millis(config.delay_ms),
            exponential_backoff: config.exponential_backoff,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        if self.exponential_backoff && retry > 1 {
            let factor = 2_u32.saturating_pow(retry - 1);
            self.delay.saturating_mul(factor)
        } else {
            self.delay
        }
    }

    /// Run `operation` until it succeeds, fails fatally, or attempts run out
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        E: Retriable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if retry < self.attempts && e.is_retriable() => {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    warn!(
                        error = %e,
                        retry,
                        of = self.attempts,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
