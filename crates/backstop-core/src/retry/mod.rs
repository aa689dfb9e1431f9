//! Composable retry engine
//!
//! A retried call is driven by a [`StrategySet`]: independent strategies that
//! each contribute some of four capabilities.
//!
//! - **classify errors**: veto retries for errors that cannot succeed later
//! - **wait**: supply a signal that wakes the engine for the next attempt
//! - **timeout**: bound the number of attempts or the elapsed time
//! - **recover**: repair systemic failures such as an expired session
//!
//! Composing small strategies ("at most 10 tries" + "at most 5 minutes" +
//! "only transient errors" + "reconnect on expired credentials") replaces a
//! bespoke retry loop per call site.
//!
//! # Example
//!
//! ```rust,no_run
//! use backstop_core::retry::{
//!     ErrorClassifier, ExponentialBackoff, MaxAttempts, RetryEngine, StrategySet,
//! };
//! use backstop_core::Error;
//!
//! async fn example() -> backstop_core::Result<()> {
//!     let strategies = StrategySet::new()
//!         .with(MaxAttempts::new(10))
//!         .with(ExponentialBackoff::new(2.0))
//!         .with(ErrorClassifier::new());
//!
//!     RetryEngine::new()
//!         .run("creating widget", &strategies, || async {
//!             Err::<(), _>(Error::pending("widget is still being provisioned"))
//!         })
//!         .await
//! }
//! ```

mod engine;
mod observer;
mod set;
mod strategies;
mod strategy;

pub use engine::{retry, RetryEngine};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use set::StrategySet;
pub use strategies::{
    AlwaysRetry, Cancellation, ClosurePredicate, ErrorClassifier, ExponentialBackoff, FixedDelay,
    MaxAttempts, MessagePredicate, NeverRetry, PerCallDeadline, ReconnectOnAuthExpiry,
    RetryPredicate, Session, WallClockDeadline, DEFAULT_INITIAL_DELAY,
};
pub use strategy::{Capabilities, Recovery, Strategy, StrategyInstance, WaitHandle};
