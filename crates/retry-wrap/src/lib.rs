//! # retry-wrap
//!
//! Retry-with-backoff decoration for fallible async operations:
//! - Retry policies with constant or capped exponential backoff
//! - Caller-supplied transient-fault classification
//! - A transparent wrapper that keeps the operation's signature
//! - Policy loading from YAML and environment variables

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::{PolicyLoader, RetryPolicies};
pub use error::{Error, Result};
pub use retry::{retry_with_policy, wrap, Operation, RetryWrapper};
pub use types::RetryPolicy;
