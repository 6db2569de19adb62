// Pacing - deliberate pauses that keep us under upstream rate limits

//! Every artificial delay in the engine (between batches, between
//! classification lookups, between retry attempts) goes through a [`Sleeper`].
//! Production uses [`TokioSleeper`]; tests plug in [`NoopSleeper`], which returns
//! immediately and records what it was asked to wait.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

/// Suspends the current task for a duration
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real timer backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper that never waits; remembers each requested delay
#[derive(Debug, Default)]
pub struct NoopSleeper {
    requested: Mutex<Vec<Duration>>,
}

impl NoopSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in call order
    pub fn requested(&self) -> Vec<Duration> {
        self.requested
            .lock()
            .map(|delays| delays.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.requested.lock() {
            delays.push(duration);
        }
    }
}

/// Fixed pause inserted between units of work
///
/// A zero interval disables pacing entirely.
#[derive(Clone)]
pub struct Pacer {
    sleeper: Arc<dyn Sleeper>,
    interval: Duration,
}

impl Pacer {
    pub fn new(sleeper: Arc<dyn Sleeper>, interval: Duration) -> Self {
        Self { sleeper, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn pause(&self) {
        if !self.interval.is_zero() {
            self.sleeper.sleep(self.interval).await;
        }
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer").field("interval", &self.interval).finish()
    }
}
