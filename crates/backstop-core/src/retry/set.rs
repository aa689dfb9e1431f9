//! Strategy collections and capability defaults

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryDefaults;
use crate::error::{Error, Result};

use super::strategies::{ErrorClassifier, ExponentialBackoff, MaxAttempts, PerCallDeadline};
use super::strategy::{Capabilities, Strategy};

/// An ordered collection of strategies for one retried call
///
/// Order matters: `proceed` and `recover` are consulted in insertion order,
/// and the first veto wins.
///
/// # Example
///
/// ```rust
/// use backstop_core::retry::{
///     Capabilities, ErrorClassifier, ExponentialBackoff, MaxAttempts, StrategySet,
/// };
///
/// let set = StrategySet::new()
///     .with(MaxAttempts::new(3))
///     .with(ExponentialBackoff::new(2.0))
///     .with(ErrorClassifier::new());
///
/// assert!(set.missing().is_empty());
/// assert!(set.capabilities().contains(Capabilities::WAIT));
/// ```
#[derive(Clone, Default)]
pub struct StrategySet {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl StrategySet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy
    pub fn with(mut self, strategy: impl Strategy + 'static) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    /// Append an already shared strategy
    pub fn with_shared(mut self, strategy: Arc<dyn Strategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Append a strategy in place
    pub fn push(&mut self, strategy: Arc<dyn Strategy>) {
        self.strategies.push(strategy);
    }

    /// Number of strategies
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Iterate over the strategies in order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Strategy>> {
        self.strategies.iter()
    }

    /// Union of all strategy capabilities
    pub fn capabilities(&self) -> Capabilities {
        self.strategies
            .iter()
            .fold(Capabilities::NONE, |acc, s| acc | s.capabilities())
    }

    /// Required capabilities no strategy provides
    pub fn missing(&self) -> Capabilities {
        Capabilities::REQUIRED.difference(self.capabilities())
    }

    /// Fail if a required capability is missing
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing();
        if missing.is_empty() {
            return Ok(());
        }
        Err(Error::bad_argument(format!(
            "retry strategies are missing required capabilities: {}",
            missing
        )))
    }

    /// Fill in missing required capabilities from `defaults`
    ///
    /// - no wait strategy: exponential backoff
    /// - no timeout strategy: attempt limit plus per-call deadline
    /// - no classifier: [`ErrorClassifier`]
    ///
    /// Recovery is never added implicitly.
    pub fn with_defaults(mut self, defaults: &RetryDefaults) -> Self {
        let missing = self.missing();

        if missing.contains(Capabilities::WAIT) {
            let mut backoff = ExponentialBackoff::new(defaults.backoff_factor)
                .with_initial_delay(Duration::from_millis(defaults.initial_delay_ms))
                .with_jitter(defaults.jitter);
            if defaults.max_delay_ms > 0 {
                backoff = backoff.with_max_delay(Duration::from_millis(defaults.max_delay_ms));
            }
            self = self.with(backoff);
        }

        if missing.contains(Capabilities::TIMEOUT) {
            self = self.with(MaxAttempts::new(defaults.max_attempts));
            if defaults.timeout_secs > 0 {
                self = self.with(PerCallDeadline::new(Duration::from_secs(
                    defaults.timeout_secs,
                )));
            }
        }

        if missing.contains(Capabilities::CLASSIFY_ERRORS) {
            self = self.with(ErrorClassifier::new());
        }

        self
    }
}

impl fmt::Debug for StrategySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}

impl<S: Strategy + 'static> FromIterator<S> for StrategySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            strategies: iter
                .into_iter()
                .map(|s| Arc::new(s) as Arc<dyn Strategy>)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::retry::strategies::FixedDelay;

    #[test]
    fn test_empty_set_misses_everything_required() {
        let set = StrategySet::new();
        assert!(set.is_empty());
        assert_eq!(set.missing(), Capabilities::REQUIRED);

        let err = set.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadArgument);
        assert!(err.to_string().contains("classify-errors, wait, timeout"));
    }

    #[test]
    fn test_defaults_fill_every_gap() {
        let set = StrategySet::new().with_defaults(&RetryDefaults::default());

        assert!(set.validate().is_ok());
        assert!(!set.capabilities().contains(Capabilities::RECOVER));
        assert_eq!(
            format!("{:?}", set),
            r#"["exponential-backoff", "max-attempts", "per-call-deadline", "error-classifier"]"#
        );
    }

    #[test]
    fn test_defaults_keep_existing_capabilities() {
        let set = StrategySet::new()
            .with(FixedDelay::new(Duration::from_millis(5)))
            .with(MaxAttempts::new(1))
            .with_defaults(&RetryDefaults::default());

        assert_eq!(
            format!("{:?}", set),
            r#"["fixed-delay", "max-attempts", "error-classifier"]"#
        );
    }

    #[test]
    fn test_zero_timeout_skips_deadline() {
        let defaults = RetryDefaults {
            timeout_secs: 0,
            ..RetryDefaults::default()
        };
        let set = StrategySet::new()
            .with(ErrorClassifier::new())
            .with(FixedDelay::new(Duration::from_millis(5)))
            .with_defaults(&defaults);

        assert_eq!(
            format!("{:?}", set),
            r#"["error-classifier", "fixed-delay", "max-attempts"]"#
        );
    }

    #[test]
    fn test_from_iterator() {
        let set: StrategySet = [MaxAttempts::new(1), MaxAttempts::new(2)].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.capabilities(), Capabilities::TIMEOUT);
    }
}
