use super::traits::ServiceResult;
use crate::error::ServiceFailure;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Per-attempt timeout plus a bounded number of retries with exponential backoff.
///
/// Only transient failures (connectivity, timeout, rate limiting, server errors) are
/// retried; everything else is returned on the first attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    request_timeout: Duration,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(60))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, request_timeout: Duration) -> Self {
        Self {
            max_retries,
            request_timeout,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub async fn execute<F, Fut, T>(&self, operation: &str, mut attempt_fn: F) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let result = match timeout(self.request_timeout, attempt_fn()).await {
                Ok(result) => result,
                Err(_) => Err(ServiceFailure::timeout(format!(
                    "{} did not complete within {}s",
                    operation,
                    self.request_timeout.as_secs_f32()
                ))),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(failure) if failure.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "{} failed ({}); retry {}/{} in {:?}",
                        operation,
                        failure,
                        attempt,
                        self.max_retries,
                        backoff
                    );
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                }
                Err(failure) => return Err(failure),
            }
        }
    }
}
