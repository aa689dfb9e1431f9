//! Retry execution engine
//!
//! The engine sequences strategy decisions: it never interprets errors
//! itself. Each call gets fresh strategy instances, so one engine can serve
//! any number of concurrent calls without locking.

use std::future::Future;

use futures::future::select_all;
use tokio::time::Instant;

use crate::config::RetryDefaults;
use crate::error::{Error, ErrorKind, Result};

use super::observer::{RetryObserver, TracingObserver};
use super::set::StrategySet;
use super::strategy::{Recovery, StrategyInstance};

/// Run `op` with a [`TracingObserver`]-backed engine
///
/// # Example
///
/// ```rust,no_run
/// use backstop_core::retry::{retry, ErrorClassifier, ExponentialBackoff, MaxAttempts, StrategySet};
/// use backstop_core::Error;
///
/// async fn example() -> backstop_core::Result<u32> {
///     let strategies = StrategySet::new()
///         .with(MaxAttempts::new(5))
///         .with(ExponentialBackoff::new(2.0))
///         .with(ErrorClassifier::new());
///
///     retry("creating disk", &strategies, || async {
///         Ok::<_, Error>(42)
///     })
///     .await
/// }
/// ```
pub async fn retry<T, E, F, Fut>(action: &str, strategies: &StrategySet, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Into<Error>,
{
    RetryEngine::new().run(action, strategies, op).await
}

/// Executes fallible operations under a set of retry strategies
#[derive(Debug, Clone, Default)]
pub struct RetryEngine<O = TracingObserver> {
    observer: O,
}

impl RetryEngine<TracingObserver> {
    /// Engine logging through `tracing`
    pub fn new() -> Self {
        Self {
            observer: TracingObserver,
        }
    }
}

impl<O> RetryEngine<O> {
    /// Replace the observer
    pub fn with_observer<O2>(self, observer: O2) -> RetryEngine<O2> {
        RetryEngine { observer }
    }

    /// The configured observer
    pub fn observer(&self) -> &O {
        &self.observer
    }
}

impl<O: RetryObserver> RetryEngine<O> {
    /// Run `op` until it succeeds or a strategy gives up
    ///
    /// `action` is a present-participle phrase such as `"creating disk"`; it
    /// appears in every log line and in the returned error. `op` may be
    /// invoked several times and must be safe to repeat.
    ///
    /// The set is used as given. A set without any wait strategy fails with
    /// `ErrorKind::Bug` after the first failed attempt instead of spinning.
    pub async fn run<T, E, F, Fut>(&self, action: &str, strategies: &StrategySet, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<Error>,
    {
        if strategies.is_empty() {
            return Err(Error::bug(format!(
                "no retry strategies configured while {}",
                action
            )));
        }

        let mut instances: Vec<Box<dyn StrategyInstance>> =
            strategies.iter().map(|s| s.instantiate()).collect();
        let start = Instant::now();
        let mut attempt: u32 = 0;

        self.observer.on_start(action);

        loop {
            attempt = attempt.saturating_add(1);

            let err: Error = match op().await {
                Ok(value) => {
                    self.observer.on_success(action, attempt, start.elapsed());
                    return Ok(value);
                }
                Err(err) => err.into(),
            };

            for instance in instances.iter_mut() {
                if let Err(veto) = instance.proceed(&err, action) {
                    self.observer.on_give_up(action, attempt, &veto);
                    return Err(veto);
                }
            }

            if err.kind().is_recoverable()
                && self.recover(action, attempt, &mut instances, &err).await
            {
                continue;
            }

            self.observer.on_retry(action, attempt, &err);

            let mut handles = Vec::new();
            let mut owners = Vec::new();
            for (index, instance) in instances.iter_mut().enumerate() {
                if let Some(handle) = instance.wait(&err) {
                    handles.push(handle);
                    owners.push(index);
                }
            }

            if handles.is_empty() {
                let bug = Error::wrap(
                    ErrorKind::Bug,
                    err,
                    format!("no retry strategy provides a wait signal while {}", action),
                );
                self.observer.on_give_up(action, attempt, &bug);
                return Err(bug);
            }

            let ((), fired, _pending) = select_all(handles).await;

            if let Err(veto) = instances[owners[fired]].on_wait_expired(&err, action) {
                self.observer.on_give_up(action, attempt, &veto);
                return Err(veto);
            }
        }
    }

    /// Run `op` after filling missing capabilities from `defaults`
    pub async fn run_with_defaults<T, E, F, Fut>(
        &self,
        action: &str,
        strategies: &StrategySet,
        defaults: &RetryDefaults,
        op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<Error>,
    {
        let strategies = strategies.clone().with_defaults(defaults);
        self.run(action, &strategies, op).await
    }

    /// Ask each instance in turn to repair `err`
    ///
    /// Returns true when one succeeded. A failed recovery is reported and
    /// ends the recovery round; the caller then waits as for any failure.
    async fn recover(
        &self,
        action: &str,
        attempt: u32,
        instances: &mut [Box<dyn StrategyInstance>],
        err: &Error,
    ) -> bool {
        for instance in instances.iter_mut() {
            match instance.recover(err).await {
                Recovery::Recovered => {
                    self.observer.on_recovered(action, attempt, err);
                    return true;
                }
                Recovery::NotApplicable => {}
                Recovery::Failed(recovery_err) => {
                    self.observer.on_recovery_failed(action, attempt, &recovery_err);
                    return false;
                }
            }
        }
        false
    }
}
