//! Retry wrapper for revision sources
//!
//! Sources make a single attempt per page. Wrapping one in [`RetryingSource`]
//! retries transient failures (see [`FetchError::is_retryable`]) with
//! exponential backoff; permanent failures are returned immediately.

use crate::fetch::{FetchError, PageRequest, RevisionPage, RevisionSource};
use async_trait::async_trait;
use std::time::Duration;

/// Backoff schedule for retried page requests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first (1 disables retries)
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .max(1.0)
            .powi(retry.saturating_sub(1) as i32);
        Duration::from_millis((self.initial_backoff.as_millis() as f64 * factor).round() as u64)
    }
}

/// A [`RevisionSource`] that retries transient page failures
pub struct RetryingSource<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: RevisionSource> RetryingSource<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        RetryingSource { inner, policy }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: RevisionSource> RevisionSource for RetryingSource<S> {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RevisionPage, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.fetch_page(request).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.backoff_for(attempt);
                    tracing::warn!(
                        title = %request.title,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "page fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
