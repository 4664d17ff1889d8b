//! Retry with exponential backoff for provider calls
//!
//! Only transient failures are retried: connect errors, timeouts,
//! rate limits (429) and server errors (5xx). Everything else fails on
//! the first attempt.

use std::future::Future;
use std::time::{Duration, SystemTime};

/// Retry policy for provider HTTP calls
///
/// Controls how many times a failed request is retried and how
/// long to wait between attempts using exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 disables retries)
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

/// Whether an HTTP status is worth retrying
#[must_use]
pub fn is_recoverable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Whether a transport-level error is worth retrying
#[must_use]
pub fn is_recoverable_error(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() {
        return true;
    }
    err.status()
        .is_some_and(|s| is_recoverable_status(s.as_u16()))
}

/// Compute the delay before the next retry attempt.
///
/// Exponential backoff: `min(base_delay * 2^attempt + jitter, max_delay)`.
/// Jitter is 0-25% of the computed delay, derived from `SystemTime`.
#[must_use]
pub fn delay_for_attempt(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base = policy
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt));
    let base = base.min(policy.max_delay);

    let jitter_nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();

    let jitter_fraction = f64::from(jitter_nanos % 250) / 1000.0;
    let jitter = base.mul_f64(jitter_fraction);

    (base + jitter).min(policy.max_delay)
}

/// Send a request, retrying transient failures per `policy`
///
/// `send` is invoked once per attempt. A response whose status is
/// recoverable is retried; the last response is returned as-is once the
/// policy is exhausted so the caller can report the status and body.
///
/// # Errors
///
/// Returns the last transport error if every attempt failed before a
/// response was received
pub async fn send_with_retry<F, Fut>(
    policy: &RetryPolicy,
    what: &'static str,
    mut send: F,
) -> std::result::Result<reqwest::Response, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let outcome = send().await;
        let retryable = match &outcome {
            Ok(resp) => is_recoverable_status(resp.status().as_u16()),
            Err(e) => is_recoverable_error(e),
        };

        if !retryable || attempt >= policy.max_retries {
            return outcome;
        }

        let delay = delay_for_attempt(policy, attempt);
        match &outcome {
            Ok(resp) => tracing::warn!(
                call = what,
                status = %resp.status(),
                attempt = attempt + 1,
                delay_ms = delay.as_millis(),
                "transient provider status, retrying"
            ),
            Err(e) => tracing::warn!(
                call = what,
                error = %e,
                attempt = attempt + 1,
                delay_ms = delay.as_millis(),
                "transient network error, retrying"
            ),
        }

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
