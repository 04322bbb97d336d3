//! Retry-with-backoff for fallible async operations
//!
//! # Features
//!
//! - Constant or exponential (doubling) backoff, optionally capped
//! - Caller-supplied transient-fault classification via `TransientClassifier`
//! - Pluggable delay primitive via `Sleeper` (tokio by default)
//! - Observable attempts via the `RetryObserver` trait, with a
//!   `TracingObserver` for logging
//! - Transparent decoration: a wrapped operation keeps its argument,
//!   output and error types
//!
//! # Example
//!
//! ```rust,no_run
//! use retry_wrap::retry::{wrap, IoKindClassifier, TracingObserver};
//! use retry_wrap::types::RetryPolicy;
//!
//! async fn read_remote(path: String) -> std::io::Result<Vec<u8>> {
//!     tokio::fs::read(path).await
//! }
//!
//! async fn example() -> std::io::Result<Vec<u8>> {
//!     let read = wrap(read_remote, RetryPolicy::default(), IoKindClassifier::default_io())
//!         .with_observer(TracingObserver::new("read_remote"));
//!
//!     read.call("/mnt/share/data.bin".to_string()).await
//! }
//! ```

mod error;
mod observer;
mod sleeper;
mod strategies;
mod wrapper;

pub use error::RetryError;
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
pub use strategies::{
    calculate_delay, from_fn, AlwaysTransient, BackoffSchedule, ClosureClassifier,
    IoKindClassifier, MessageClassifier, NeverTransient, SelfClassified, TransientClassifier,
    TransientFault,
};
pub use wrapper::{retry_with_policy, wrap, Operation, Retrier, RetryWrapper};
