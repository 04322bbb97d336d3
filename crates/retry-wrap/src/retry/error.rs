//! Terminal failure report for a retried call
//!
//! `RetryError` never replaces the operation's error; it carries it together
//! with how the call ended. `into_source` gives back the error unchanged.

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// How a retried call failed
///
/// The error type is generic over `E`, the error type of the wrapped operation.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was classified as permanent and was not retried
    Permanent {
        /// The attempt that produced the error (1-indexed)
        attempt: u32,
        /// The operation's error
        source: E,
    },

    /// The final permitted attempt failed
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// The error from the final attempt
        source: E,
        /// Total time spent across all attempts and delays
        total_duration: Duration,
    },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Permanent { attempt, source } => {
                write!(f, "permanent failure on attempt {}: {}", attempt, source)
            }
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => {
                write!(
                    f,
                    "retry exhausted after {} attempts over {:.2}s: {}",
                    attempts,
                    total_duration.as_secs_f64(),
                    source
                )
            }
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source_ref())
    }
}

impl<E> RetryError<E> {
    /// Create a permanent failure report
    pub fn permanent(attempt: u32, source: E) -> Self {
        RetryError::Permanent { attempt, source }
    }

    /// Create an exhausted failure report
    pub fn exhausted(attempts: u32, source: E, total_duration: Duration) -> Self {
        RetryError::Exhausted {
            attempts,
            source,
            total_duration,
        }
    }

    /// Number of times the operation was invoked
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Permanent { attempt, .. } => *attempt,
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Check if the final attempt was used up
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// Check if the error was classified as permanent
    pub fn is_permanent(&self) -> bool {
        matches!(self, RetryError::Permanent { .. })
    }

    /// Get the operation's error, consuming this report
    pub fn into_source(self) -> E {
        match self {
            RetryError::Permanent { source, .. } => source,
            RetryError::Exhausted { source, .. } => source,
        }
    }

    /// Get a reference to the operation's error
    pub fn source_ref(&self) -> &E {
        match self {
            RetryError::Permanent { source, .. } => source,
            RetryError::Exhausted { source, .. } => source,
        }
    }

    /// Map the error type using a closure
    pub fn map_err<F, E2>(self, f: F) -> RetryError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            RetryError::Permanent { attempt, source } => RetryError::Permanent {
                attempt,
                source: f(source),
            },
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => RetryError::Exhausted {
                attempts,
                source: f(source),
                total_duration,
            },
        }
    }
}
