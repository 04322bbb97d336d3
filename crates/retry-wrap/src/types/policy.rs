//! Retry policy configuration
//!
//! A [`RetryPolicy`] is built once and then treated as frozen; every wrapped
//! call reads it but never mutates it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::BackoffSchedule;

/// Retry policy for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Number of re-attempts after the initial attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay in milliseconds before the first retry
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Double the delay on every retry instead of keeping it constant
    #[serde(default)]
    pub exponential_backoff: bool,

    /// Upper bound on any computed delay; `None` means unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
            exponential_backoff: false,
            max_delay_ms: None,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    1000
}

impl RetryPolicy {
    /// Start building a policy from the defaults
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Total number of attempts, counting the initial one
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Check the policy for misconfiguration
    ///
    /// A zero base delay is accepted and means retries happen back to back.
    /// A cap must be positive and must not sit below the base delay. The cap
    /// only bounds exponential delays, but a cap below the base is rejected in
    /// either mode.
    pub fn validate(&self) -> Result<()> {
        if let Some(max_delay_ms) = self.max_delay_ms {
            if max_delay_ms == 0 {
                return Err(Error::invalid_policy("max-delay-ms must be positive"));
            }
            if max_delay_ms < self.base_delay_ms {
                return Err(Error::invalid_policy(format!(
                    "max-delay-ms ({}) must be >= base-delay-ms ({})",
                    max_delay_ms, self.base_delay_ms
                )));
            }
        }
        Ok(())
    }

    /// The delays this policy produces before each retry, in order
    ///
    /// Yields exactly `max_retries` values and never applies jitter.
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule::new(*self)
    }
}

/// Builder for [`RetryPolicy`] with validation on [`build`](Self::build)
///
/// # Example
///
/// ```rust
/// use retry_wrap::types::RetryPolicy;
///
/// let policy = RetryPolicy::builder()
///     .max_retries(4)
///     .base_delay_ms(1000)
///     .exponential_backoff(true)
///     .max_delay_ms(4000)
///     .build()
///     .unwrap();
///
/// assert_eq!(policy.total_attempts(), 5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Set the number of retries after the initial attempt
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry
    pub fn base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.policy.base_delay_ms = base_delay_ms;
        self
    }

    /// Enable or disable exponential growth of the delay
    pub fn exponential_backoff(mut self, enabled: bool) -> Self {
        self.policy.exponential_backoff = enabled;
        self
    }

    /// Cap every computed delay at `max_delay_ms`
    pub fn max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.policy.max_delay_ms = Some(max_delay_ms);
        self
    }

    /// Remove the delay cap
    pub fn unbounded(mut self) -> Self {
        self.policy.max_delay_ms = None;
        self
    }

    /// Validate and return the policy
    pub fn build(self) -> Result<RetryPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}
