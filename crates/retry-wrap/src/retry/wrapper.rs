//! Retry decorator for async operations
//!
//! [`wrap`] turns an [`Operation`] into a [`RetryWrapper`] with the same
//! argument, output and error types. The attempt loop itself lives in
//! [`Retrier`], which also drives [`retry_with_policy`] for zero-argument
//! futures.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use crate::types::RetryPolicy;

use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver};
use super::sleeper::{Sleeper, TokioSleeper};
use super::strategies::{calculate_delay, TransientClassifier};

/// A fallible async operation taking its whole argument list as `A`
///
/// Use a tuple for several arguments. Any `Fn(A) -> impl Future<Output =
/// Result<T, E>>` is an operation, and so is a [`RetryWrapper`], which makes
/// wrappers nestable.
pub trait Operation<A> {
    /// Success value
    type Output;
    /// Failure value
    type Error;

    /// Start one invocation
    fn invoke(&self, args: A) -> impl Future<Output = Result<Self::Output, Self::Error>>;
}

impl<A, F, Fut, T, E> Operation<A> for F
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    type Output = T;
    type Error = E;

    fn invoke(&self, args: A) -> impl Future<Output = Result<T, E>> {
        self(args)
    }
}

/// Execute a zero-argument async operation under a policy
///
/// Convenience for one-off calls; uses the tokio sleeper and no observer.
///
/// # Example
///
/// ```rust,no_run
/// use retry_wrap::retry::{retry_with_policy, IoKindClassifier};
/// use retry_wrap::types::RetryPolicy;
///
/// async fn example() -> std::io::Result<String> {
///     let policy = RetryPolicy::default();
///
///     retry_with_policy(&policy, IoKindClassifier::default_io(), || async {
///         Ok("fetched".to_string())
///     })
///     .await
/// }
/// ```
pub async fn retry_with_policy<C, F, Fut, T, E>(
    policy: &RetryPolicy,
    classifier: C,
    op: F,
) -> Result<T, E>
where
    C: TransientClassifier<E>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    Retrier::new(*policy, classifier)
        .run(op)
        .await
        .map_err(RetryError::into_source)
}

/// Wrap `operation` so that transient failures are retried under `policy`
///
/// # Example
///
/// ```rust,no_run
/// use retry_wrap::retry::{wrap, MessageClassifier};
/// use retry_wrap::types::RetryPolicy;
///
/// async fn fetch((host, port): (String, u16)) -> Result<String, std::io::Error> {
///     Ok(format!("{}:{}", host, port))
/// }
///
/// async fn example() -> Result<String, std::io::Error> {
///     let policy = RetryPolicy::builder()
///         .max_retries(4)
///         .exponential_backoff(true)
///         .max_delay_ms(4000)
///         .build()
///         .unwrap();
///
///     let fetch = wrap(fetch, policy, MessageClassifier::network_errors());
///     fetch.call(("example.com".to_string(), 443)).await
/// }
/// ```
pub fn wrap<Op, C>(operation: Op, policy: RetryPolicy, classifier: C) -> RetryWrapper<Op, C> {
    RetryWrapper {
        operation,
        retrier: Retrier::new(policy, classifier),
    }
}

/// The attempt loop: classification, backoff and observation
///
/// Holds no per-call state, so one `Retrier` may drive any number of
/// concurrent calls.
pub struct Retrier<C, S = TokioSleeper, O = NoOpObserver> {
    policy: RetryPolicy,
    classifier: C,
    sleeper: S,
    observer: O,
    jitter: bool,
}

impl<C> Retrier<C> {
    /// Create a retrier with the tokio sleeper, no observer and no jitter
    pub fn new(policy: RetryPolicy, classifier: C) -> Self {
        Self {
            policy,
            classifier,
            sleeper: TokioSleeper,
            observer: NoOpObserver,
            jitter: false,
        }
    }
}

impl<C, S, O> Retrier<C, S, O> {
    /// Set the delay primitive
    pub fn with_sleeper<S2>(self, sleeper: S2) -> Retrier<C, S2, O> {
        Retrier {
            policy: self.policy,
            classifier: self.classifier,
            sleeper,
            observer: self.observer,
            jitter: self.jitter,
        }
    }

    /// Set the observer
    pub fn with_observer<O2>(self, observer: O2) -> Retrier<C, S, O2> {
        Retrier {
            policy: self.policy,
            classifier: self.classifier,
            sleeper: self.sleeper,
            observer,
            jitter: self.jitter,
        }
    }

    /// Enable or disable jitter on computed delays
    ///
    /// Disabled by default so that schedules are exact.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// The policy this retrier applies
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds, fails permanently or runs out of attempts
    ///
    /// `op` is called once per attempt and each future is awaited to
    /// completion before the next call. On the final attempt the classifier
    /// is not consulted: the failure is reported as exhausted.
    pub async fn run<F, Fut, T, E>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        C: TransientClassifier<E>,
        S: Sleeper,
        O: RetryObserver,
    {
        let start = Instant::now();
        let max_attempts = self.policy.total_attempts();
        let mut attempts_remaining = self.policy.max_retries;
        let mut retry_index: u32 = 0;

        loop {
            let attempt = attempt_number(retry_index);
            self.observer.on_attempt_start(attempt, max_attempts);

            let err = match op().await {
                Ok(value) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(value);
                }
                Err(err) => err,
            };

            if attempts_remaining == 0 {
                self.observer.on_exhausted(attempt, &err);
                return Err(RetryError::exhausted(attempt, err, start.elapsed()));
            }

            if !self.classifier.is_transient(&err) {
                self.observer.on_permanent_failure(attempt, &err);
                return Err(RetryError::permanent(attempt, err));
            }

            let delay = calculate_delay(&self.policy, retry_index, self.jitter);
            self.observer.on_attempt_failed(attempt, &err, delay);
            drop(err);

            self.sleeper.sleep(delay).await;

            attempts_remaining -= 1;
            retry_index += 1;
        }
    }
}

/// 1-based attempt number for a 0-based retry index, saturating like
/// [`RetryPolicy::total_attempts`]
fn attempt_number(retry_index: u32) -> u32 {
    retry_index.saturating_add(1)
}

/// An operation decorated with retry semantics
///
/// Created by [`wrap`]. Calls take the same arguments and produce the same
/// output and error types as the wrapped operation.
///
/// A `RetryWrapper` is itself an [`Operation`], so it can be wrapped again.
/// The attempt counts then multiply: an inner wrapper allowing `m` attempts
/// inside an outer one allowing `n` may invoke the operation `m * n` times.
pub struct RetryWrapper<Op, C, S = TokioSleeper, O = NoOpObserver> {
    operation: Op,
    retrier: Retrier<C, S, O>,
}

impl<Op, C, S, O> RetryWrapper<Op, C, S, O> {
    /// Set the delay primitive
    pub fn with_sleeper<S2>(self, sleeper: S2) -> RetryWrapper<Op, C, S2, O> {
        RetryWrapper {
            operation: self.operation,
            retrier: self.retrier.with_sleeper(sleeper),
        }
    }

    /// Set the observer
    pub fn with_observer<O2>(self, observer: O2) -> RetryWrapper<Op, C, S, O2> {
        RetryWrapper {
            operation: self.operation,
            retrier: self.retrier.with_observer(observer),
        }
    }

    /// Enable or disable jitter on computed delays
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.retrier = self.retrier.with_jitter(jitter);
        self
    }

    /// The policy this wrapper applies
    pub fn policy(&self) -> &RetryPolicy {
        self.retrier.policy()
    }

    /// The undecorated operation
    pub fn inner(&self) -> &Op {
        &self.operation
    }

    /// Invoke the operation with retries
    ///
    /// Every attempt receives a clone of `args`. The error, if any, is the
    /// operation's own error: the first permanent one, or the last one when
    /// attempts run out.
    pub async fn call<A>(&self, args: A) -> Result<Op::Output, Op::Error>
    where
        A: Clone,
        Op: Operation<A>,
        Op::Error: Display,
        C: TransientClassifier<Op::Error>,
        S: Sleeper,
        O: RetryObserver,
    {
        self.call_reported(args)
            .await
            .map_err(RetryError::into_source)
    }

    /// Like [`call`](Self::call), but reports how the call ended on failure
    pub async fn call_reported<A>(&self, args: A) -> Result<Op::Output, RetryError<Op::Error>>
    where
        A: Clone,
        Op: Operation<A>,
        Op::Error: Display,
        C: TransientClassifier<Op::Error>,
        S: Sleeper,
        O: RetryObserver,
    {
        let operation = &self.operation;
        self.retrier
            .run(move || operation.invoke(args.clone()))
            .await
    }
}

impl<A, Op, C, S, O> Operation<A> for RetryWrapper<Op, C, S, O>
where
    A: Clone,
    Op: Operation<A>,
    Op::Error: Display,
    C: TransientClassifier<Op::Error>,
    S: Sleeper,
    O: RetryObserver,
{
    type Output = Op::Output;
    type Error = Op::Error;

    fn invoke(&self, args: A) -> impl Future<Output = Result<Self::Output, Self::Error>> {
        self.call(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::observer::StatsObserver;
    use crate::retry::sleeper::RecordingSleeper;
    use crate::retry::strategies::{from_fn, AlwaysTransient, NeverTransient};
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay_ms: 10,
            exponential_backoff: false,
            max_delay_ms: None,
        }
    }

    #[test]
    fn test_attempt_number_saturates() {
        assert_eq!(attempt_number(0), 1);
        assert_eq!(attempt_number(u32::MAX - 1), u32::MAX);
        assert_eq!(attempt_number(u32::MAX), u32::MAX);

        let policy = RetryPolicy {
            max_retries: u32::MAX,
            ..test_policy()
        };
        assert_eq!(attempt_number(policy.max_retries), policy.total_attempts());
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let sleeper = RecordingSleeper::new();
        let observer = Arc::new(StatsObserver::new());

        let result: Result<&str, io::Error> = Retrier::new(test_policy(), AlwaysTransient)
            .with_sleeper(sleeper.clone())
            .with_observer(observer.clone())
            .run(|| async { Ok("success") })
            .await
            .map_err(RetryError::into_source);

        assert_eq!(result.unwrap(), "success");
        assert!(sleeper.delays().is_empty());
        assert_eq!(observer.attempt_starts(), 1);
        assert_eq!(observer.successes(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_reports_last_attempt() {
        let sleeper = RecordingSleeper::new();
        let observer = Arc::new(StatsObserver::new());
        let calls = AtomicU32::new(0);

        let err = Retrier::new(test_policy(), AlwaysTransient)
            .with_sleeper(sleeper.clone())
            .with_observer(observer.clone())
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err::<(), _>(format!("failure {}", n)) }
            })
            .await
            .unwrap_err();

        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.into_source(), "failure 3");
        assert_eq!(sleeper.delays_ms(), vec![10, 10]);
        assert_eq!(observer.failures(), 2);
        assert_eq!(observer.exhaustions(), 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_skips_delay() {
        let sleeper = RecordingSleeper::new();
        let observer = Arc::new(StatsObserver::new());

        let err = Retrier::new(test_policy(), NeverTransient)
            .with_sleeper(sleeper.clone())
            .with_observer(observer.clone())
            .run(|| async { Err::<(), _>(io::Error::new(io::ErrorKind::NotFound, "gone")) })
            .await
            .unwrap_err();

        assert!(err.is_permanent());
        assert_eq!(err.attempts(), 1);
        assert!(sleeper.delays().is_empty());
        assert_eq!(observer.permanent_failures(), 1);
    }

    #[tokio::test]
    async fn test_classifier_not_consulted_on_final_attempt() {
        let consulted = Arc::new(AtomicU32::new(0));
        let counter = consulted.clone();
        let classifier = from_fn(move |_: &String| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        let err = Retrier::new(test_policy(), classifier)
            .with_sleeper(RecordingSleeper::new())
            .run(|| async { Err::<(), _>("busy".to_string()) })
            .await
            .unwrap_err();

        assert!(err.is_exhausted());
        // Three attempts, classified only before the two retries
        assert_eq!(consulted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..test_policy()
        };
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);

        let err = Retrier::new(policy, AlwaysTransient)
            .with_sleeper(sleeper.clone())
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("down") }
            })
            .await
            .unwrap_err();

        assert!(err.is_exhausted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_wrapper_reports_policy_and_inner() {
        let double = |x: u32| async move { Ok::<_, String>(x * 2) };
        let wrapped = wrap(double, test_policy(), AlwaysTransient);

        assert_eq!(wrapped.policy().max_retries, 2);
        assert_eq!(wrapped.inner().invoke(4u32).await.unwrap(), 8);
        assert_eq!(wrapped.call(21u32).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_real_sleeper_with_short_delays() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = retry_with_policy(&test_policy(), AlwaysTransient, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err("not yet")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert!(start.elapsed() >= std::time::Duration::from_millis(20));
    }
}
