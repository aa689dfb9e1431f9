//! Retry configuration types
//!
//! These types describe the defaults applied to strategy sets that leave a
//! required capability uncovered, plus per-action overrides.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete retry configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Defaults for every action
    #[serde(default)]
    pub defaults: RetryDefaults,

    /// Per-action overrides keyed by action name
    #[serde(default)]
    pub actions: HashMap<String, RetryOverrides>,
}

impl RetryConfig {
    /// Effective defaults for `action`
    ///
    /// Fields set in the action's override replace the global defaults.
    pub fn for_action(&self, action: &str) -> RetryDefaults {
        match self.actions.get(action) {
            Some(overrides) => overrides.apply(&self.defaults),
            None => self.defaults.clone(),
        }
    }
}

/// Defaults used to complete a strategy set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryDefaults {
    /// Retries allowed after the first attempt
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-call deadline in seconds (0 disables the deadline)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Backoff multiplier applied after each wait
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// First wait in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single wait in milliseconds (0 means uncapped)
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Add random jitter to waits
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryDefaults {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
            backoff_factor: default_backoff_factor(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            jitter: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    30
}
fn default_timeout_secs() -> u64 {
    300 // 5 minutes
}
fn default_backoff_factor() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    60000
}

/// Partial [`RetryDefaults`] for a single action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<bool>,
}

impl RetryOverrides {
    /// Apply these overrides on top of `base`
    pub fn apply(&self, base: &RetryDefaults) -> RetryDefaults {
        RetryDefaults {
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            timeout_secs: self.timeout_secs.unwrap_or(base.timeout_secs),
            backoff_factor: self.backoff_factor.unwrap_or(base.backoff_factor),
            initial_delay_ms: self.initial_delay_ms.unwrap_or(base.initial_delay_ms),
            max_delay_ms: self.max_delay_ms.unwrap_or(base.max_delay_ms),
            jitter: self.jitter.unwrap_or(base.jitter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_defaults() {
        let defaults = RetryDefaults::default();
        assert_eq!(defaults.max_attempts, 30);
        assert_eq!(defaults.timeout_secs, 300);
        assert_eq!(defaults.backoff_factor, 2.0);
        assert_eq!(defaults.initial_delay_ms, 1000);
        assert!(!defaults.jitter);
    }

    #[test]
    fn test_partial_yaml_uses_field_defaults() {
        let defaults: RetryDefaults = serde_yaml_ng::from_str("max-attempts: 5\n").unwrap();
        assert_eq!(defaults.max_attempts, 5);
        assert_eq!(defaults.timeout_secs, 300);
    }

    #[test]
    fn test_for_action_applies_overrides() {
        let yaml = r#"
defaults:
  max-attempts: 10
actions:
  creating disk:
    max-attempts: 3
    jitter: true
"#;
        let config: RetryConfig = serde_yaml_ng::from_str(yaml).unwrap();

        let disk = config.for_action("creating disk");
        assert_eq!(disk.max_attempts, 3);
        assert!(disk.jitter);
        assert_eq!(disk.timeout_secs, 300);

        let other = config.for_action("deleting vm");
        assert_eq!(other.max_attempts, 10);
        assert!(!other.jitter);
    }
}
