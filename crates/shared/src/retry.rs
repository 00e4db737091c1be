//! Retry helpers with exponential backoff.

use crate::{ErrorEnvelope, RequestContext, Result};
use std::future::Future;
use std::time::Duration;

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts (including the first try).
    pub max_attempts: u32,
    /// Base delay for backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Policy for transient remote failures: three attempts, 1 s base, 8 s cap.
    #[must_use]
    pub const fn transient() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 8_000,
        }
    }

    /// Delay before the retry following `attempt` (1-indexed).
    #[must_use]
    pub fn delay_for_attempt(self, attempt: u32) -> Duration {
        let pow = attempt.saturating_sub(1).min(30);
        let delay = self
            .base_delay_ms
            .saturating_mul(1u64 << pow)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Retry a fallible async operation with exponential backoff.
///
/// Only errors classified [`Retriable`](crate::ErrorClass::Retriable) are
/// retried; everything else is returned to the caller on first failure.
pub async fn retry_async<T, F, Fut>(
    ctx: &RequestContext,
    policy: RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_async_with_observer(ctx, policy, operation, &mut op, |_, _| {}).await
}

/// Retry with a callback invoked on each retryable failure.
pub async fn retry_async_with_observer<T, F, Fut, Obs>(
    ctx: &RequestContext,
    policy: RetryPolicy,
    operation: &'static str,
    op: &mut F,
    mut on_retry: Obs,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    Obs: FnMut(u32, &ErrorEnvelope),
{
    let mut attempt = 0u32;

    loop {
        attempt = attempt.saturating_add(1);
        ctx.ensure_not_cancelled(operation)?;

        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.class.is_retriable() || attempt >= policy.max_attempts {
                    return Err(error);
                }

                on_retry(attempt, &error);
                let delay = policy.delay_for_attempt(attempt);
                tokio::select! {
                    () = ctx.cancelled() => {
                        return Err(ErrorEnvelope::cancelled("operation cancelled")
                            .with_metadata("operation", operation));
                    },
                    () = tokio::time::sleep(delay) => {},
                }
            },
        }
    }
}
