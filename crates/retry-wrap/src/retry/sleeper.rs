//! Delay primitives used between attempts
//!
//! The retry loop never touches a timer directly. It asks a [`Sleeper`] for a
//! future that resolves after the backoff delay, which keeps the loop usable
//! with a recording sleeper in tests and dry runs.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};

/// Suspends the caller for a duration without blocking other work
pub trait Sleeper: Send + Sync {
    /// Return a future that completes after at least `duration`
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Sleeps on the tokio timer
///
/// Requires a running tokio runtime with the time driver enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed()
    }
}

/// Records every requested delay and completes immediately
///
/// Clones share the same log, so a clone can be handed to a wrapper while
/// the original is kept for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Create a sleeper with an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// All delays requested so far, oldest first
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requested delays in whole milliseconds
    pub fn delays_ms(&self) -> Vec<u64> {
        self.delays()
            .into_iter()
            .map(|d| d.as_millis() as u64)
            .collect()
    }

    /// Sum of all requested delays
    pub fn total(&self) -> Duration {
        self.delays().into_iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        future::ready(()).boxed()
    }
}

impl<T: Sleeper + ?Sized> Sleeper for Arc<T> {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        (**self).sleep(duration)
    }
}
