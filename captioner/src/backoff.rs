use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};
use crate::remote::RemoteError;

/// How to react to a throttling response.
///
/// Only throttling is retried; every other error returns immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry forever, sleeping `delay` after each throttled attempt.
    Fixed { delay: Duration },
    /// Give up after `max_attempts`; after attempt `i` (0-indexed) sleep
    /// `base + step * i`.
    Linear {
        max_attempts: u32,
        base: Duration,
        step: Duration,
    },
}

impl RetryPolicy {
    /// Used for job listing: throttling is assumed to clear eventually.
    pub const fn enumeration() -> Self {
        RetryPolicy::Fixed {
            delay: Duration::from_secs(5),
        }
    }

    /// Used for job submission: 30 attempts, sleeping `1 + 5*i` seconds.
    pub const fn submission() -> Self {
        RetryPolicy::Linear {
            max_attempts: 30,
            base: Duration::from_secs(1),
            step: Duration::from_secs(5),
        }
    }

    /// `None` for an unbounded policy.
    pub fn max_attempts(&self) -> Option<u32> {
        match self {
            RetryPolicy::Fixed { .. } => None,
            RetryPolicy::Linear { max_attempts, .. } => Some(*max_attempts),
        }
    }

    /// Sleep that follows throttled attempt `attempt` (0-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self {
            RetryPolicy::Fixed { delay } => *delay,
            RetryPolicy::Linear { base, step, .. } => *base + *step * attempt,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-throttling error, or the
/// policy runs out of attempts (`Error::RetriesExhausted`).
pub async fn retry_throttled<T, F, Fut>(policy: RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RemoteError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_throttling() => {
                if let Some(max) = policy.max_attempts() {
                    if attempt + 1 >= max {
                        warn!(operation, attempts = max, error = %e, "still throttled; giving up");
                        return Err(Error::RetriesExhausted { attempts: max });
                    }
                }
                let delay = policy.delay_after(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_secs = delay.as_secs_f64(),
                    error = %e,
                    "rate-limited; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
