//! Error classification
//!
//! The [`ErrorClassifier`] strategy vetoes retries for errors whose kind is
//! not retryable. A [`RetryPredicate`] can narrow the retryable set further,
//! for example to retry only errors mentioning network trouble.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::retry::strategy::{Capabilities, Strategy, StrategyInstance};

/// A predicate that determines whether an error should be retried
///
/// # Example
///
/// ```rust
/// use backstop_core::retry::RetryPredicate;
/// use backstop_core::{Error, ErrorKind};
///
/// struct NotWhileLocked;
///
/// impl RetryPredicate for NotWhileLocked {
///     fn should_retry(&self, error: &Error) -> bool {
///         !error.has_kind(ErrorKind::Locked)
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Determine whether the given error should be retried
    fn should_retry(&self, error: &Error) -> bool;
}

/// A predicate that always returns true
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl RetryPredicate for AlwaysRetry {
    fn should_retry(&self, _error: &Error) -> bool {
        true
    }
}

/// A predicate that never retries
#[derive(Debug, Clone, Copy)]
pub struct NeverRetry;

impl RetryPredicate for NeverRetry {
    fn should_retry(&self, _error: &Error) -> bool {
        false
    }
}

/// A predicate that uses a closure to determine retryability
pub struct ClosurePredicate<F> {
    predicate: F,
}

impl<F> ClosurePredicate<F> {
    /// Create a new closure-based predicate
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> RetryPredicate for ClosurePredicate<F>
where
    F: Fn(&Error) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &Error) -> bool {
        (self.predicate)(error)
    }
}

/// A predicate that retries only on specific error messages
#[derive(Debug, Clone)]
pub struct MessagePredicate {
    retryable_patterns: Vec<String>,
}

impl MessagePredicate {
    /// Create a new message predicate with the given patterns
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            retryable_patterns: patterns.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Create a predicate for common network errors
    pub fn network_errors() -> Self {
        Self::new(vec![
            "timeout".to_string(),
            "timed out".to_string(),
            "connection reset".to_string(),
            "connection refused".to_string(),
            "network unreachable".to_string(),
            "temporary failure".to_string(),
        ])
    }
}

impl RetryPredicate for MessagePredicate {
    fn should_retry(&self, error: &Error) -> bool {
        let error_msg = error.to_string().to_lowercase();
        self.retryable_patterns
            .iter()
            .any(|pattern| error_msg.contains(pattern))
    }
}

/// Retry only errors whose kind allows automatic retries
///
/// Unclassified errors (`ErrorKind::Unidentified`) are never retried.
#[derive(Clone)]
pub struct ErrorClassifier {
    predicate: Arc<dyn RetryPredicate>,
}

impl ErrorClassifier {
    /// Classifier that retries every retryable kind
    pub fn new() -> Self {
        Self {
            predicate: Arc::new(AlwaysRetry),
        }
    }

    /// Additionally require `predicate` to accept the error
    pub fn with_predicate(predicate: impl RetryPredicate + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorClassifier").finish_non_exhaustive()
    }
}

impl Strategy for ErrorClassifier {
    fn name(&self) -> &'static str {
        "error-classifier"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::CLASSIFY_ERRORS
    }

    fn instantiate(&self) -> Box<dyn StrategyInstance> {
        Box::new(self.clone())
    }
}

impl StrategyInstance for ErrorClassifier {
    fn proceed(&mut self, err: &Error, action: &str) -> Result<()> {
        if err.can_auto_retry() && self.predicate.should_retry(err) {
            return Ok(());
        }
        Err(Error::wrap(
            err.kind(),
            err.to_string(),
            format!("non-retryable error encountered while {}, giving up", action),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_retryable_kind_proceeds() {
        let mut instance = ErrorClassifier::new().instantiate();

        assert!(instance
            .proceed(&Error::pending("disk creation pending"), "creating disk")
            .is_ok());
        assert!(instance
            .proceed(&Error::transient("503"), "creating disk")
            .is_ok());
    }

    #[test]
    fn test_non_retryable_kind_vetoes_with_same_kind() {
        let mut instance = ErrorClassifier::new().instantiate();

        let veto = instance
            .proceed(&Error::not_found("disk 42"), "creating disk")
            .unwrap_err();
        assert_eq!(veto.kind(), ErrorKind::NotFound);
        assert_eq!(
            veto.to_string(),
            "non-retryable error encountered while creating disk, giving up: disk 42"
        );
    }

    #[test]
    fn test_timeout_is_terminal() {
        let mut instance = ErrorClassifier::new().instantiate();
        let veto = instance
            .proceed(&Error::timeout("deadline exceeded"), "creating disk")
            .unwrap_err();
        assert_eq!(veto.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_unidentified_is_never_retried() {
        let mut instance = ErrorClassifier::new().instantiate();
        let veto = instance
            .proceed(&Error::unidentified("???"), "creating disk")
            .unwrap_err();
        assert_eq!(veto.kind(), ErrorKind::Unidentified);
    }

    #[test]
    fn test_predicate_narrows_retryable_set() {
        let mut instance =
            ErrorClassifier::with_predicate(MessagePredicate::network_errors()).instantiate();

        assert!(instance
            .proceed(&Error::connection("connection reset by peer"), "syncing")
            .is_ok());
        assert!(instance
            .proceed(&Error::transient("quota exceeded"), "syncing")
            .is_err());
    }

    #[test]
    fn test_predicate_cannot_widen_retryable_set() {
        let mut instance = ErrorClassifier::with_predicate(AlwaysRetry).instantiate();
        assert!(instance
            .proceed(&Error::bad_argument("name too long"), "syncing")
            .is_err());
    }

    #[test]
    fn test_closure_predicate() {
        let predicate = ClosurePredicate::new(|err: &Error| !err.has_kind(ErrorKind::Locked));

        assert!(predicate.should_retry(&Error::pending("pending")));
        assert!(!predicate.should_retry(&Error::locked("locked")));
        assert!(!NeverRetry.should_retry(&Error::pending("pending")));
    }
}
