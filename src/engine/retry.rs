//! Bounded retry loops
//!
//! A [`RetryPolicy`] is an explicit, counted loop: `max_attempts` is the total
//! number of calls, not the number of retries after the first. Only
//! [`SyncError::is_transient`](crate::SyncError::is_transient) failures are
//! retried; anything else ends the loop on the spot.
//!
//! ```text
//! fixed(3, 2s):        call ─2s─ call ─2s─ call
//! exponential(3, 1s):  call ─1s─ call ─2s─ call
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::pacing::Sleeper;
use crate::Result;

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    Exponential { multiplier: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

/// Final result of a retry loop plus the number of calls it took
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: delay,
            backoff: Backoff::Fixed,
        }
    }

    /// Delay doubles after every failed attempt
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff: Backoff::Exponential { multiplier: 2 },
        }
    }

    /// Single attempt, no waiting
    pub fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Wait after the `failed_attempt`-th failure (1-based)
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential { multiplier } => {
                let factor = multiplier.saturating_pow(failed_attempt.saturating_sub(1));
                self.base_delay.saturating_mul(factor)
            }
        }
    }

    /// Run `operation` until it succeeds, fails permanently or the budget is spent
    pub async fn run<T, F, Fut>(&self, sleeper: &dyn Sleeper, label: &str, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(err) if !err.is_transient() || attempt >= self.max_attempts => {
                    return RetryOutcome {
                        result: Err(err),
                        attempts: attempt,
                    }
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    if !delay.is_zero() {
                        sleeper.sleep(delay).await;
                    }
                }
            }
        }
    }
}
