use crate::seq::error::SeqError;
use rand::{RngCore, rng};
use std::{future::Future, time::Duration};
use tracing::warn;

/// Largest exponent applied to the base delay.
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Bounded retry with exponential backoff.
///
/// The policy wraps a single transactional operation and re-runs it from
/// scratch whenever it fails with a retryable [`SeqError`]. The delay before
/// retry `n` (0-based) is `base_delay * 2^n` plus up to `max_jitter` of random
/// spread so that callers that collided once do not collide again in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50)).with_jitter(Duration::from_millis(20))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Deterministic part of the delay before retry number `retry` (0-based).
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << retry.min(MAX_BACKOFF_SHIFT))
    }

    fn delay_with_jitter(&self, retry: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let random_delta = if jitter_ms == 0 {
            0
        } else {
            rng().next_u64() % jitter_ms.saturating_add(1)
        };
        self.backoff_delay(retry)
            .saturating_add(Duration::from_millis(random_delta))
    }

    /// Run `f` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    pub async fn run<F, Fut, R>(&self, op: &str, mut f: F) -> Result<R, SeqError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, SeqError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(r) => return Ok(r),
                Err(e) if e.is_retryable() => {
                    if attempt >= self.max_attempts {
                        return Err(SeqError::RetriesExhausted {
                            attempts: attempt,
                            source: Box::new(e),
                        });
                    }

                    let delay = self.delay_with_jitter(attempt - 1);
                    warn!(
                        op = op,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient datastore failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
