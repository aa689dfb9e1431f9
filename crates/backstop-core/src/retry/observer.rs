//! Retry observation and logging
//!
//! This module provides the `RetryObserver` trait for monitoring retried
//! actions and a `TracingObserver` implementation that logs using the
//! `tracing` crate.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::error::Error;

/// Observer trait for retry engine events
///
/// `action` is the present-participle description passed to the engine, for
/// example `"creating disk"`.
///
/// # Example
///
/// ```rust
/// use backstop_core::retry::RetryObserver;
/// use backstop_core::Error;
/// use std::time::Duration;
///
/// struct MetricsObserver;
///
/// impl RetryObserver for MetricsObserver {
///     fn on_start(&self, action: &str) {}
///     fn on_success(&self, action: &str, attempts: u32, elapsed: Duration) {}
///     fn on_retry(&self, action: &str, attempt: u32, error: &Error) {}
///     fn on_give_up(&self, action: &str, attempts: u32, error: &Error) {}
/// }
/// ```
pub trait RetryObserver: Send + Sync {
    /// Called once before the first attempt
    ///
    /// # Arguments
    ///
    /// * `action` - Description of the retried call
    fn on_start(&self, action: &str);

    /// Called when an attempt succeeds
    ///
    /// # Arguments
    ///
    /// * `action` - Description of the retried call
    /// * `attempts` - Number of attempts made, including the successful one
    /// * `elapsed` - Time since the first attempt started
    fn on_success(&self, action: &str, attempts: u32, elapsed: Duration);

    /// Called when an attempt failed and the engine is about to wait
    ///
    /// # Arguments
    ///
    /// * `action` - Description of the retried call
    /// * `attempt` - The attempt that failed (1-indexed)
    /// * `error` - The error that attempt returned
    fn on_retry(&self, action: &str, attempt: u32, error: &Error);

    /// Called when the engine stops retrying
    ///
    /// # Arguments
    ///
    /// * `action` - Description of the retried call
    /// * `attempts` - Total number of attempts made
    /// * `error` - The error returned to the caller, usually a strategy's veto
    fn on_give_up(&self, action: &str, attempts: u32, error: &Error);

    /// Called when a recovery strategy repaired the failure
    fn on_recovered(&self, action: &str, attempt: u32, error: &Error) {
        let _ = (action, attempt, error);
    }

    /// Called when a recovery strategy tried and failed
    ///
    /// `error` is the recovery failure, not the original error.
    fn on_recovery_failed(&self, action: &str, attempt: u32, error: &Error) {
        let _ = (action, attempt, error);
    }
}

/// A no-op observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_start(&self, _action: &str) {}

    fn on_success(&self, _action: &str, _attempts: u32, _elapsed: Duration) {}

    fn on_retry(&self, _action: &str, _attempt: u32, _error: &Error) {}

    fn on_give_up(&self, _action: &str, _attempts: u32, _error: &Error) {}
}

/// An observer that logs retry events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_start`: DEBUG
/// - `on_retry`: DEBUG for in-progress errors (pending, conflict, locked), WARN otherwise
/// - `on_success`: INFO (if > 1 attempt) or DEBUG (first attempt)
/// - `on_recovered`: INFO
/// - `on_recovery_failed`: WARN
/// - `on_give_up`: ERROR
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TracingObserver {
    /// Create a new tracing observer
    pub fn new() -> Self {
        Self
    }
}

impl RetryObserver for TracingObserver {
    fn on_start(&self, action: &str) {
        tracing::debug!(action = %action, "{}...", capitalize(action));
    }

    fn on_success(&self, action: &str, attempts: u32, elapsed: Duration) {
        if attempts > 1 {
            tracing::info!(
                action = %action,
                attempts = attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                "completed {} after retry",
                action
            );
        } else {
            tracing::debug!(
                action = %action,
                elapsed_ms = elapsed.as_millis() as u64,
                "completed {}",
                action
            );
        }
    }

    fn on_retry(&self, action: &str, attempt: u32, error: &Error) {
        if error.kind().is_in_progress() {
            tracing::debug!(
                action = %action,
                attempt = attempt,
                kind = %error.kind(),
                "{}, retrying...",
                error
            );
        } else {
            tracing::warn!(
                action = %action,
                attempt = attempt,
                kind = %error.kind(),
                error = %error,
                "failed {}, retrying...",
                action
            );
        }
    }

    fn on_give_up(&self, action: &str, attempts: u32, error: &Error) {
        tracing::error!(
            action = %action,
            attempts = attempts,
            kind = %error.kind(),
            error = %error,
            "giving up on {}",
            action
        );
    }

    fn on_recovered(&self, action: &str, attempt: u32, error: &Error) {
        tracing::info!(
            action = %action,
            attempt = attempt,
            error = %error,
            "recovered from failure while {}, retrying immediately",
            action
        );
    }

    fn on_recovery_failed(&self, action: &str, attempt: u32, error: &Error) {
        tracing::warn!(
            action = %action,
            attempt = attempt,
            error = %error,
            "recovery failed while {}",
            action
        );
    }
}

/// Uppercase the first character of an action description
pub(crate) fn capitalize(action: &str) -> String {
    let mut chars = action.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// An observer that collects statistics about retry events
///
/// Useful for testing and metrics collection.
#[derive(Debug, Default)]
pub struct StatsObserver {
    starts: AtomicU32,
    successes: AtomicU32,
    retries: AtomicU32,
    give_ups: AtomicU32,
    recoveries: AtomicU32,
    failed_recoveries: AtomicU32,
}

impl StatsObserver {
    /// Create a new stats observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of started actions
    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of successful actions
    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    /// Number of retries announced
    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    /// Number of abandoned actions
    pub fn give_ups(&self) -> u32 {
        self.give_ups.load(Ordering::SeqCst)
    }

    /// Number of successful recoveries
    pub fn recoveries(&self) -> u32 {
        self.recoveries.load(Ordering::SeqCst)
    }

    /// Number of failed recoveries
    pub fn failed_recoveries(&self) -> u32 {
        self.failed_recoveries.load(Ordering::SeqCst)
    }
}

impl RetryObserver for StatsObserver {
    fn on_start(&self, _action: &str) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, _action: &str, _attempts: u32, _elapsed: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_retry(&self, _action: &str, _attempt: u32, _error: &Error) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }

    fn on_give_up(&self, _action: &str, _attempts: u32, _error: &Error) {
        self.give_ups.fetch_add(1, Ordering::SeqCst);
    }

    fn on_recovered(&self, _action: &str, _attempt: u32, _error: &Error) {
        self.recoveries.fetch_add(1, Ordering::SeqCst);
    }

    fn on_recovery_failed(&self, _action: &str, _attempt: u32, _error: &Error) {
        self.failed_recoveries.fetch_add(1, Ordering::SeqCst);
    }
}

/// Implement RetryObserver for Arc<T> where T: RetryObserver
impl<T: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<T> {
    fn on_start(&self, action: &str) {
        (**self).on_start(action)
    }

    fn on_success(&self, action: &str, attempts: u32, elapsed: Duration) {
        (**self).on_success(action, attempts, elapsed)
    }

    fn on_retry(&self, action: &str, attempt: u32, error: &Error) {
        (**self).on_retry(action, attempt, error)
    }

    fn on_give_up(&self, action: &str, attempts: u32, error: &Error) {
        (**self).on_give_up(action, attempts, error)
    }

    fn on_recovered(&self, action: &str, attempt: u32, error: &Error) {
        (**self).on_recovered(action, attempt, error)
    }

    fn on_recovery_failed(&self, action: &str, attempt: u32, error: &Error) {
        (**self).on_recovery_failed(action, attempt, error)
    }
}

/// Implement RetryObserver for Box<T> where T: RetryObserver
impl<T: RetryObserver + ?Sized> RetryObserver for Box<T> {
    fn on_start(&self, action: &str) {
        (**self).on_start(action)
    }

    fn on_success(&self, action: &str, attempts: u32, elapsed: Duration) {
        (**self).on_success(action, attempts, elapsed)
    }

    fn on_retry(&self, action: &str, attempt: u32, error: &Error) {
        (**self).on_retry(action, attempt, error)
    }

    fn on_give_up(&self, action: &str, attempts: u32, error: &Error) {
        (**self).on_give_up(action, attempts, error)
    }

    fn on_recovered(&self, action: &str, attempt: u32, error: &Error) {
        (**self).on_recovered(action, attempt, error)
    }

    fn on_recovery_failed(&self, action: &str, attempt: u32, error: &Error) {
        (**self).on_recovery_failed(action, attempt, error)
    }
}
