use std::future::Future;

use rand::Rng as _;

use crate::error::MediaError;
use crate::http::{HttpClient, HttpResponse};

/// Retry decision returned by the error classifier callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Retry,
    Abort,
}

/// Bounded retry configuration shared by every catalog call.
///
/// `max_retries` counts additional attempts after the first, so the default
/// of 3 means at most 4 requests. Delays use exponential backoff with jitter;
/// a zero base delay retries immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 0,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    /// Compute the delay for a given retry attempt (0-indexed).
    ///
    /// Formula: `min(base_delay * 2^retry, max_delay) + random_jitter(0..base_delay)`
    pub fn delay_for_retry(&self, retry: u32) -> std::time::Duration {
        let exp_delay = self
            .base_delay_secs
            .saturating_mul(1u64.checked_shl(retry).unwrap_or(u64::MAX));
        let capped = exp_delay.min(self.max_delay_secs);
        let jitter = if self.base_delay_secs > 0 {
            rand::thread_rng().gen_range(0..self.base_delay_secs)
        } else {
            0
        };
        std::time::Duration::from_secs(capped + jitter)
    }
}

/// Retry an async operation with exponential backoff and jitter.
///
/// Returns the first `Ok` result, or the last error if retries are exhausted
/// or the classifier returns `Abort`.
pub async fn retry_with_backoff<F, Fut, T, E, C>(
    config: &RetryConfig,
    classifier: C,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryAction,
    E: std::fmt::Display,
{
    let total_attempts = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                attempt += 1;
                if classifier(&e) == RetryAction::Abort {
                    return Err(e);
                }
                if attempt >= total_attempts {
                    tracing::info!("Retried {} times, giving up: {}", config.max_retries, e);
                    return Err(e);
                }
                let delay = config.delay_for_retry(attempt - 1);
                tracing::warn!(
                    "Retryable error (attempt {}/{}), retrying in {}s: {}",
                    attempt,
                    total_attempts,
                    delay.as_secs(),
                    e
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// GET `url`, retrying non-2xx responses under `config`.
///
/// Exhaustion yields [`MediaError::Upstream`] with the last status seen.
/// Transport failures are not retried.
pub async fn get_ok(
    client: &dyn HttpClient,
    url: &str,
    config: &RetryConfig,
) -> Result<HttpResponse, MediaError> {
    retry_with_backoff(
        config,
        |e: &MediaError| match e {
            MediaError::Upstream { .. } => RetryAction::Retry,
            _ => RetryAction::Abort,
        },
        || async move {
            let resp = client.get(url).await?;
            if resp.is_success() {
                Ok(resp)
            } else {
                Err(MediaError::Upstream {
                    status: resp.status,
                    url: url.to_string(),
                })
            }
        },
    )
    .await
}
