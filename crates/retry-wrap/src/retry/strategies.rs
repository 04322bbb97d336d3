//! Backoff delay computation and transient-fault classifiers
//!
//! The delay for a retry depends only on the policy and the 0-based retry
//! index, so the whole schedule of a policy can be inspected up front with
//! [`BackoffSchedule`].

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::types::RetryPolicy;

/// Calculate the delay before a retry
///
/// # Arguments
///
/// * `policy` - The retry policy containing the timing parameters
/// * `retry_index` - 0 for the delay before the first retry, 1 before the second, ...
/// * `jitter` - Whether to add random jitter to the delay
///
/// # Example
///
/// ```rust
/// use retry_wrap::retry::calculate_delay;
/// use retry_wrap::types::RetryPolicy;
///
/// let policy = RetryPolicy {
///     max_retries: 4,
///     base_delay_ms: 1000,
///     exponential_backoff: true,
///     max_delay_ms: Some(4000),
/// };
///
/// assert_eq!(calculate_delay(&policy, 0, false).as_millis(), 1000);
/// assert_eq!(calculate_delay(&policy, 1, false).as_millis(), 2000);
/// assert_eq!(calculate_delay(&policy, 3, false).as_millis(), 4000);
/// ```
pub fn calculate_delay(policy: &RetryPolicy, retry_index: u32, jitter: bool) -> Duration {
    // The cap only bounds exponential growth; a constant delay is used as-is
    let cap_ms = if policy.exponential_backoff {
        policy.max_delay_ms.unwrap_or(u64::MAX)
    } else {
        u64::MAX
    };

    let delay_ms = if policy.exponential_backoff {
        policy
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(retry_index))
            .min(cap_ms)
    } else {
        policy.base_delay_ms
    };

    // Jitter adds up to 25% and never pushes the delay past the cap
    let final_delay_ms = if jitter && delay_ms > 0 {
        let jitter_range = delay_ms / 4;
        let jitter_value = rand::rng().random_range(0..=jitter_range);
        delay_ms.saturating_add(jitter_value).min(cap_ms)
    } else {
        delay_ms
    };

    Duration::from_millis(final_delay_ms)
}

/// Iterator over the delays a policy produces, one per retry
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    policy: RetryPolicy,
    next_index: u32,
}

impl BackoffSchedule {
    pub(crate) fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            next_index: 0,
        }
    }
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.next_index >= self.policy.max_retries {
            return None;
        }
        let delay = calculate_delay(&self.policy, self.next_index, false);
        self.next_index += 1;
        Some(delay)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.policy.max_retries - self.next_index) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BackoffSchedule {}

/// Decides whether an error is transient and therefore worth retrying
///
/// Classifiers are pure: the same error must always produce the same answer.
///
/// # Example
///
/// ```rust
/// use retry_wrap::retry::TransientClassifier;
/// use std::io::{Error, ErrorKind};
///
/// struct Unavailable;
///
/// impl TransientClassifier<Error> for Unavailable {
///     fn is_transient(&self, error: &Error) -> bool {
///         matches!(error.kind(), ErrorKind::TimedOut | ErrorKind::ConnectionRefused)
///     }
/// }
/// ```
pub trait TransientClassifier<E: ?Sized>: Send + Sync {
    /// Return true if the error is expected to clear up after a delay
    fn is_transient(&self, error: &E) -> bool;
}

/// Treats every error as transient
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysTransient;

impl<E: ?Sized> TransientClassifier<E> for AlwaysTransient {
    fn is_transient(&self, _error: &E) -> bool {
        true
    }
}

/// Treats every error as permanent, disabling retries
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverTransient;

impl<E: ?Sized> TransientClassifier<E> for NeverTransient {
    fn is_transient(&self, _error: &E) -> bool {
        false
    }
}

/// A classifier backed by a closure
pub struct ClosureClassifier<F> {
    predicate: F,
}

impl<F> ClosureClassifier<F> {
    /// Create a new closure-based classifier
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

/// Shorthand for [`ClosureClassifier::new`]
pub fn from_fn<E, F>(predicate: F) -> ClosureClassifier<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    ClosureClassifier::new(predicate)
}

impl<E, F> TransientClassifier<E> for ClosureClassifier<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn is_transient(&self, error: &E) -> bool {
        (self.predicate)(error)
    }
}

/// Error types that know whether they are transient
pub trait TransientFault {
    /// Return true if retrying may succeed
    fn is_transient(&self) -> bool;
}

/// Defers to the error's own [`TransientFault`] implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfClassified;

impl<E: TransientFault + ?Sized> TransientClassifier<E> for SelfClassified {
    fn is_transient(&self, error: &E) -> bool {
        TransientFault::is_transient(error)
    }
}

/// Classifies `std::io::Error` by its kind
#[derive(Debug, Clone)]
pub struct IoKindClassifier {
    transient_kinds: Vec<io::ErrorKind>,
}

impl IoKindClassifier {
    /// Kinds that usually indicate temporary unavailability
    pub fn default_io() -> Self {
        Self::with_kinds(vec![
            io::ErrorKind::TimedOut,
            io::ErrorKind::Interrupted,
            io::ErrorKind::WouldBlock,
            io::ErrorKind::ConnectionRefused,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe,
        ])
    }

    /// Treat exactly the given kinds as transient
    pub fn with_kinds(kinds: Vec<io::ErrorKind>) -> Self {
        Self {
            transient_kinds: kinds,
        }
    }
}

impl TransientClassifier<io::Error> for IoKindClassifier {
    fn is_transient(&self, error: &io::Error) -> bool {
        self.transient_kinds.contains(&error.kind())
    }
}

/// Classifies errors by case-insensitive substrings of their message
#[derive(Debug, Clone)]
pub struct MessageClassifier {
    patterns: Vec<String>,
}

impl MessageClassifier {
    /// Create a classifier matching any of the given patterns
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns: patterns.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Patterns for common network failures
    pub fn network_errors() -> Self {
        Self::new(vec![
            "timeout".to_string(),
            "timed out".to_string(),
            "connection reset".to_string(),
            "connection refused".to_string(),
            "network unreachable".to_string(),
            "temporarily unavailable".to_string(),
            "temporary failure".to_string(),
        ])
    }
}

impl<E: fmt::Display + ?Sized> TransientClassifier<E> for MessageClassifier {
    fn is_transient(&self, error: &E) -> bool {
        let message = error.to_string().to_lowercase();
        self.patterns.iter().any(|pattern| message.contains(pattern))
    }
}

impl<E: ?Sized, T: TransientClassifier<E> + ?Sized> TransientClassifier<E> for &T {
    fn is_transient(&self, error: &E) -> bool {
        (**self).is_transient(error)
    }
}

impl<E: ?Sized, T: TransientClassifier<E> + ?Sized> TransientClassifier<E> for Arc<T> {
    fn is_transient(&self, error: &E) -> bool {
        (**self).is_transient(error)
    }
}

impl<E: ?Sized, T: TransientClassifier<E> + ?Sized> TransientClassifier<E> for Box<T> {
    fn is_transient(&self, error: &E) -> bool {
        (**self).is_transient(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(exponential_backoff: bool, max_delay_ms: Option<u64>) -> RetryPolicy {
        RetryPolicy {
            max_retries: 4,
            base_delay_ms: 1000,
            exponential_backoff,
            max_delay_ms,
        }
    }

    #[test]
    fn test_constant_delay() {
        let policy = policy(false, Some(4000));
        for index in 0..4 {
            assert_eq!(
                calculate_delay(&policy, index, false),
                Duration::from_millis(1000)
            );
        }
    }

    #[test]
    fn test_constant_delay_ignores_cap() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay_ms: 5000,
            exponential_backoff: false,
            max_delay_ms: Some(1000),
        };
        assert_eq!(
            calculate_delay(&policy, 1, false),
            Duration::from_millis(5000)
        );

        let jittered = calculate_delay(&policy, 0, true).as_millis();
        assert!((5000..=6250).contains(&jittered));
    }

    #[test]
    fn test_exponential_first_retry_uses_base() {
        let policy = policy(true, None);
        // 1000 * 2^0, not 1000 * 2^1
        assert_eq!(
            calculate_delay(&policy, 0, false),
            Duration::from_millis(1000)
        );
        assert_eq!(
            calculate_delay(&policy, 4, false),
            Duration::from_millis(16000)
        );
    }

    #[test]
    fn test_exponential_capped() {
        let policy = policy(true, Some(4000));
        let delays: Vec<u128> = (0..6)
            .map(|index| calculate_delay(&policy, index, false).as_millis())
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 4000, 4000, 4000]);
    }

    #[test]
    fn test_exponential_saturates_instead_of_overflowing() {
        let policy = policy(true, None);
        assert_eq!(
            calculate_delay(&policy, 200, false),
            Duration::from_millis(u64::MAX)
        );

        let capped = RetryPolicy {
            max_delay_ms: Some(60_000),
            ..policy
        };
        assert_eq!(
            calculate_delay(&capped, 200, false),
            Duration::from_millis(60_000)
        );
    }

    #[test]
    fn test_zero_base_delay_stays_zero() {
        let policy = RetryPolicy {
            base_delay_ms: 0,
            ..policy(true, None)
        };
        assert_eq!(calculate_delay(&policy, 100, true), Duration::ZERO);
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = policy(false, None);
        for _ in 0..200 {
            let delay = calculate_delay(&policy, 0, true);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1250));
        }
    }

    #[test]
    fn test_jitter_never_exceeds_cap() {
        let policy = policy(true, Some(4000));
        for _ in 0..200 {
            assert!(calculate_delay(&policy, 5, true) <= Duration::from_millis(4000));
        }
    }

    #[test]
    fn test_schedule_length_and_values() {
        let schedule = policy(true, Some(4000)).schedule();
        assert_eq!(schedule.len(), 4);
        let delays: Vec<u128> = schedule.map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 4000]);
    }

    #[test]
    fn test_schedule_empty_without_retries() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.schedule().count(), 0);
    }

    #[test]
    fn test_always_and_never() {
        let error = io::Error::new(io::ErrorKind::NotFound, "not found");
        assert!(AlwaysTransient.is_transient(&error));
        assert!(!NeverTransient.is_transient(&error));
    }

    #[test]
    fn test_closure_classifier() {
        let classifier = from_fn(|code: &u16| *code >= 500);
        assert!(classifier.is_transient(&503));
        assert!(!classifier.is_transient(&404));
    }

    #[test]
    fn test_io_kind_classifier() {
        let classifier = IoKindClassifier::default_io();
        assert!(classifier.is_transient(&io::Error::new(io::ErrorKind::TimedOut, "slow")));
        assert!(!classifier.is_transient(&io::Error::new(io::ErrorKind::NotFound, "missing")));
    }

    #[test]
    fn test_message_classifier_case_insensitive() {
        let classifier = MessageClassifier::network_errors();
        assert!(classifier.is_transient("Connection Reset by peer"));
        assert!(classifier.is_transient(&io::Error::other("request timed out")));
        assert!(!classifier.is_transient("invalid input"));
    }

    #[derive(Debug)]
    enum FetchError {
        Unavailable,
        BadRequest,
    }

    impl TransientFault for FetchError {
        fn is_transient(&self) -> bool {
            matches!(self, FetchError::Unavailable)
        }
    }

    #[test]
    fn test_self_classified() {
        assert!(SelfClassified.is_transient(&FetchError::Unavailable));
        assert!(!SelfClassified.is_transient(&FetchError::BadRequest));
    }

    #[test]
    fn test_shared_classifier_forwards() {
        let classifier: Arc<dyn TransientClassifier<io::Error>> =
            Arc::new(IoKindClassifier::default_io());
        let error = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert!(classifier.is_transient(&error));
    }
}
