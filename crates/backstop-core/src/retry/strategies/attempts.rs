//! Attempt-count limit

use crate::error::{Error, ErrorKind, Result};
use crate::retry::strategy::{Capabilities, Strategy, StrategyInstance};

/// Stop after `n` retries
///
/// The first attempt is not a retry, so the operation runs at most `n + 1`
/// times.
#[derive(Debug, Clone, Copy)]
pub struct MaxAttempts {
    retries: u32,
}

impl MaxAttempts {
    /// Allow `retries` retries after the first attempt
    pub fn new(retries: u32) -> Self {
        Self { retries }
    }

    /// Configured retry budget
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

impl Strategy for MaxAttempts {
    fn name(&self) -> &'static str {
        "max-attempts"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::TIMEOUT
    }

    fn instantiate(&self) -> Box<dyn StrategyInstance> {
        Box::new(MaxAttemptsInstance {
            retries: self.retries,
            failures: 0,
        })
    }
}

struct MaxAttemptsInstance {
    retries: u32,
    failures: u32,
}

impl StrategyInstance for MaxAttemptsInstance {
    fn proceed(&mut self, err: &Error, action: &str) -> Result<()> {
        self.failures = self.failures.saturating_add(1);
        if self.failures > self.retries {
            return Err(Error::wrap(
                ErrorKind::Timeout,
                err.to_string(),
                format!(
                    "maximum retries of {} reached while {}, giving up",
                    self.retries, action
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_exactly_n_retries() {
        let strategy = MaxAttempts::new(2);
        let mut instance = strategy.instantiate();
        let err = Error::transient("unavailable");

        assert!(instance.proceed(&err, "testing").is_ok());
        assert!(instance.proceed(&err, "testing").is_ok());

        let veto = instance.proceed(&err, "testing").unwrap_err();
        assert_eq!(veto.kind(), ErrorKind::Timeout);
        assert!(veto.to_string().contains("maximum retries of 2"));
        assert!(veto.to_string().contains("testing"));
        assert!(veto.to_string().contains("unavailable"));
    }

    #[test]
    fn test_zero_retries_vetoes_first_failure() {
        let mut instance = MaxAttempts::new(0).instantiate();
        assert!(instance
            .proceed(&Error::transient("unavailable"), "testing")
            .is_err());
    }

    #[test]
    fn test_instances_are_independent() {
        let strategy = MaxAttempts::new(1);
        let err = Error::transient("unavailable");

        let mut first = strategy.instantiate();
        assert!(first.proceed(&err, "testing").is_ok());
        assert!(first.proceed(&err, "testing").is_err());

        let mut second = strategy.instantiate();
        assert!(second.proceed(&err, "testing").is_ok());
    }
}
