//! Retry policy configuration loader
//!
//! Loads policies with the following precedence (low to high):
//! 1. Built-in defaults
//! 2. YAML file or string
//! 3. Environment variables (`RETRY_*` prefix), applied to the default policy
//!
//! Every policy is validated after the last layer is applied.

use std::collections::HashMap;
use std::env;
use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::RetryPolicy;

/// Environment variable overriding `max-retries`
pub const ENV_MAX_RETRIES: &str = "RETRY_MAX_RETRIES";
/// Environment variable overriding `base-delay-ms`
pub const ENV_BASE_DELAY_MS: &str = "RETRY_BASE_DELAY_MS";
/// Environment variable overriding `exponential-backoff`
pub const ENV_EXPONENTIAL_BACKOFF: &str = "RETRY_EXPONENTIAL_BACKOFF";
/// Environment variable overriding `max-delay-ms`; empty or `none` removes the cap
pub const ENV_MAX_DELAY_MS: &str = "RETRY_MAX_DELAY_MS";

/// A default policy plus named per-operation policies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicies {
    /// Policy used when no operation-specific entry exists
    #[serde(default)]
    pub default: RetryPolicy,

    /// Per-operation policies
    #[serde(default)]
    pub operations: HashMap<String, RetryPolicy>,
}

impl RetryPolicies {
    /// Policy for `operation`, falling back to the default
    pub fn policy_for(&self, operation: &str) -> &RetryPolicy {
        self.operations.get(operation).unwrap_or(&self.default)
    }

    /// Validate the default and every named policy
    pub fn validate(&self) -> Result<()> {
        self.default
            .validate()
            .map_err(|e| with_context("default policy", e))?;

        for (name, policy) in &self.operations {
            policy
                .validate()
                .map_err(|e| with_context(&format!("operation '{}'", name), e))?;
        }
        Ok(())
    }

    /// Overlay another set of policies on top of this one
    ///
    /// The overlay's default wins; named policies are merged by key.
    pub fn merge(self, overlay: RetryPolicies) -> RetryPolicies {
        self.apply(PolicyOverlay {
            default: Some(overlay.default),
            operations: overlay.operations,
        })
    }

    fn apply(mut self, overlay: PolicyOverlay) -> RetryPolicies {
        self.operations.extend(overlay.operations);
        if let Some(default) = overlay.default {
            self.default = default;
        }
        self
    }
}

/// A parsed policy document; a missing `default` key keeps the base default
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PolicyOverlay {
    #[serde(default)]
    default: Option<RetryPolicy>,

    #[serde(default)]
    operations: HashMap<String, RetryPolicy>,
}

/// Loads [`RetryPolicies`] from YAML and the environment
#[derive(Debug, Clone, Default)]
pub struct PolicyLoader {
    base: RetryPolicies,
}

impl PolicyLoader {
    /// Create a loader starting from the built-in defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader starting from the given policies
    pub fn with_base(base: RetryPolicies) -> Self {
        Self { base }
    }

    /// Load policies from a YAML file, then apply environment overrides
    pub fn load_file(&self, path: &Utf8Path) -> Result<RetryPolicies> {
        if !path.exists() {
            return Err(Error::config_not_found(path.as_str()));
        }

        let content = fs::read_to_string(path)?;
        let overlay: PolicyOverlay = serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))?;

        tracing::debug!(
            path = %path,
            operations = overlay.operations.len(),
            "loaded retry policies"
        );
        self.finish(self.base.clone().apply(overlay))
    }

    /// Load policies from a YAML string, then apply environment overrides
    pub fn load_str(&self, yaml: &str) -> Result<RetryPolicies> {
        let overlay: PolicyOverlay = serde_yaml_ng::from_str(yaml)?;
        self.finish(self.base.clone().apply(overlay))
    }

    /// Apply environment overrides to the base policies only
    pub fn load_env(&self) -> Result<RetryPolicies> {
        self.finish(self.base.clone())
    }

    fn finish(&self, policies: RetryPolicies) -> Result<RetryPolicies> {
        let policies = Self::apply_env_overrides(policies)?;
        policies.validate()?;
        Ok(policies)
    }

    /// Apply `RETRY_*` environment variable overrides to the default policy
    fn apply_env_overrides(mut policies: RetryPolicies) -> Result<RetryPolicies> {
        let policy = &mut policies.default;

        if let Ok(val) = env::var(ENV_MAX_RETRIES) {
            policy.max_retries = val.trim().parse().map_err(|_| {
                Error::invalid_config(format!(
                    "{} must be a non-negative integer",
                    ENV_MAX_RETRIES
                ))
            })?;
        }

        if let Ok(val) = env::var(ENV_BASE_DELAY_MS) {
            policy.base_delay_ms = val.trim().parse().map_err(|_| {
                Error::invalid_config(format!(
                    "{} must be a non-negative integer",
                    ENV_BASE_DELAY_MS
                ))
            })?;
        }

        if let Ok(val) = env::var(ENV_EXPONENTIAL_BACKOFF) {
            policy.exponential_backoff = parse_bool(&val).ok_or_else(|| {
                Error::invalid_config(format!("{} must be true or false", ENV_EXPONENTIAL_BACKOFF))
            })?;
        }

        if let Ok(val) = env::var(ENV_MAX_DELAY_MS) {
            let val = val.trim();
            policy.max_delay_ms = if val.is_empty() || val.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(val.parse().map_err(|_| {
                    Error::invalid_config(format!(
                        "{} must be a positive integer or 'none'",
                        ENV_MAX_DELAY_MS
                    ))
                })?)
            };
        }

        Ok(policies)
    }
}

fn with_context(context: &str, err: Error) -> Error {
    match err {
        Error::InvalidPolicy { message } => {
            Error::invalid_policy(format!("{}: {}", context, message))
        }
        other => other,
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
