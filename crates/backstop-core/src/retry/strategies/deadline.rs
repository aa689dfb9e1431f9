//! Elapsed-time limits

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, ErrorKind, Result};
use crate::retry::strategy::{Capabilities, Strategy, StrategyInstance};

/// Stop once a deadline shared by several calls has passed
///
/// Useful when one logical operation issues multiple retried calls that must
/// all finish within one budget.
#[derive(Debug, Clone, Copy)]
pub struct WallClockDeadline {
    timeout: Duration,
    start: Instant,
}

impl WallClockDeadline {
    /// Deadline of `timeout` measured from `start`
    pub fn new(timeout: Duration, start: Instant) -> Self {
        Self { timeout, start }
    }

    /// Deadline of `timeout` measured from now
    pub fn starting_now(timeout: Duration) -> Self {
        Self::new(timeout, Instant::now())
    }
}

impl Strategy for WallClockDeadline {
    fn name(&self) -> &'static str {
        "wall-clock-deadline"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::TIMEOUT
    }

    fn instantiate(&self) -> Box<dyn StrategyInstance> {
        Box::new(DeadlineInstance {
            timeout: self.timeout,
            start: self.start,
        })
    }
}

/// Stop once a call has been retrying for longer than `timeout`
///
/// The clock starts when the call begins, so every call gets a fresh budget.
#[derive(Debug, Clone, Copy)]
pub struct PerCallDeadline {
    timeout: Duration,
}

impl PerCallDeadline {
    /// Per-call deadline of `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Strategy for PerCallDeadline {
    fn name(&self) -> &'static str {
        "per-call-deadline"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::TIMEOUT
    }

    fn instantiate(&self) -> Box<dyn StrategyInstance> {
        Box::new(DeadlineInstance {
            timeout: self.timeout,
            start: Instant::now(),
        })
    }
}

struct DeadlineInstance {
    timeout: Duration,
    start: Instant,
}

impl StrategyInstance for DeadlineInstance {
    fn proceed(&mut self, err: &Error, action: &str) -> Result<()> {
        if self.start.elapsed() > self.timeout {
            return Err(Error::wrap(
                ErrorKind::Timeout,
                err.to_string(),
                format!(
                    "timeout of {}s exceeded while {}, giving up",
                    self.timeout.as_secs_f64(),
                    action
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_per_call_deadline_expires() {
        let strategy = PerCallDeadline::new(Duration::from_secs(5));
        let mut instance = strategy.instantiate();
        let err = Error::transient("unavailable");

        assert!(instance.proceed(&err, "testing").is_ok());
        tokio::time::advance(Duration::from_secs(6)).await;

        let veto = instance.proceed(&err, "testing").unwrap_err();
        assert_eq!(veto.kind(), ErrorKind::Timeout);
        assert!(veto.to_string().contains("while testing"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_call_deadline_restarts_per_instance() {
        let strategy = PerCallDeadline::new(Duration::from_secs(5));
        let err = Error::transient("unavailable");

        tokio::time::advance(Duration::from_secs(60)).await;

        let mut instance = strategy.instantiate();
        assert!(instance.proceed(&err, "testing").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_deadline_is_shared() {
        let strategy = WallClockDeadline::starting_now(Duration::from_secs(5));
        let err = Error::transient("unavailable");

        tokio::time::advance(Duration::from_secs(6)).await;

        // A fresh instance still measures from the shared start
        let mut instance = strategy.instantiate();
        assert!(instance.proceed(&err, "testing").is_err());
    }
}
