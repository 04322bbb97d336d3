//! Configuration loading for retry policies

mod loader;

pub use loader::{
    PolicyLoader, RetryPolicies, ENV_BASE_DELAY_MS, ENV_EXPONENTIAL_BACKOFF, ENV_MAX_DELAY_MS,
    ENV_MAX_RETRIES,
};
