//! Strategy traits for the retry engine
//!
//! A [`Strategy`] is an immutable factory describing one facet of a retry
//! policy. For every retried call the engine asks each strategy for a fresh
//! [`StrategyInstance`], which holds the per-call state (attempt counters,
//! deadlines, current backoff) and is dropped when the call returns.

use std::fmt;
use std::future::Future;
use std::ops::{BitOr, BitOrAssign};
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Set of capabilities a strategy contributes
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    /// No capabilities
    pub const NONE: Capabilities = Capabilities(0);
    /// Decides whether an error is retryable
    pub const CLASSIFY_ERRORS: Capabilities = Capabilities(1);
    /// Supplies a wait signal between attempts
    pub const WAIT: Capabilities = Capabilities(1 << 1);
    /// Bounds the total number of attempts or the elapsed time
    pub const TIMEOUT: Capabilities = Capabilities(1 << 2);
    /// Repairs systemic failures such as an expired session
    pub const RECOVER: Capabilities = Capabilities(1 << 3);

    /// Capabilities every strategy set needs to terminate and make progress
    pub const REQUIRED: Capabilities = Capabilities(1 | (1 << 1) | (1 << 2));

    const NAMES: [(Capabilities, &'static str); 4] = [
        (Capabilities::CLASSIFY_ERRORS, "classify-errors"),
        (Capabilities::WAIT, "wait"),
        (Capabilities::TIMEOUT, "timeout"),
        (Capabilities::RECOVER, "recover"),
    ];

    /// Whether all capabilities in `other` are present
    pub fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no capability is present
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Capabilities in `self` that are not in `other`
    pub fn difference(self, other: Capabilities) -> Capabilities {
        Capabilities(self.0 & !other.0)
    }

    /// Iterate over the individual capabilities present
    pub fn iter(self) -> impl Iterator<Item = Capabilities> {
        Self::NAMES
            .into_iter()
            .map(|(cap, _)| cap)
            .filter(move |cap| self.contains(*cap))
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Self) -> Self::Output {
        Capabilities(self.0 | rhs.0)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(cap, _)| self.contains(*cap))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join(", "))
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capabilities({})", self)
    }
}

/// Outcome of a recovery attempt
#[derive(Debug)]
pub enum Recovery {
    /// The failure was repaired; the operation can be retried immediately
    Recovered,
    /// This strategy cannot help with the failure
    NotApplicable,
    /// Recovery was attempted and failed
    Failed(Error),
}

/// One-shot readiness signal returned by [`StrategyInstance::wait`]
///
/// The engine races all handles of a call and wakes on the first to fire.
pub struct WaitHandle(BoxFuture<'static, ()>);

impl WaitHandle {
    /// Fire after the given duration
    pub fn after(delay: Duration) -> Self {
        Self(tokio::time::sleep(delay).boxed())
    }

    /// Fire when the token is cancelled
    pub fn on_cancel(token: CancellationToken) -> Self {
        Self(async move { token.cancelled().await }.boxed())
    }

    /// Fire when an arbitrary future completes
    pub fn from_future<F>(fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(fut.boxed())
    }
}

impl Future for WaitHandle {
    type Output = ();

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        self.0.as_mut().poll(cx)
    }
}

impl fmt::Debug for WaitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WaitHandle")
    }
}

/// Immutable, shareable retry policy facet
///
/// Strategies are reused across many independent calls; all mutable state
/// lives in the instance returned by [`Strategy::instantiate`].
pub trait Strategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Capabilities this strategy contributes
    fn capabilities(&self) -> Capabilities;

    /// Create the per-call state
    fn instantiate(&self) -> Box<dyn StrategyInstance>;
}

/// Per-call state of a [`Strategy`]
///
/// Every method defaults to "does not participate", so a strategy only
/// implements the hooks matching its capabilities.
#[async_trait]
pub trait StrategyInstance: Send {
    /// Decide whether another attempt is permitted after `err`
    ///
    /// # Arguments
    ///
    /// * `err` - The error returned by the attempt that just failed
    /// * `action` - Description of the retried call, for the veto message
    ///
    /// # Errors
    ///
    /// Returns the veto that aborts the retry loop. It is handed to the
    /// caller as-is.
    fn proceed(&mut self, err: &Error, action: &str) -> Result<()> {
        let _ = (err, action);
        Ok(())
    }

    /// Try to repair a systemic failure before the next attempt
    ///
    /// Only called for recoverable kinds. A `Recovery::Recovered` result
    /// retries immediately, skipping the wait.
    async fn recover(&mut self, err: &Error) -> Recovery {
        let _ = err;
        Recovery::NotApplicable
    }

    /// Signal to wait on before the next attempt
    ///
    /// # Returns
    ///
    /// A handle racing against the other instances' handles, or `None` if
    /// this instance does not wait.
    fn wait(&mut self, err: &Error) -> Option<WaitHandle> {
        let _ = err;
        None
    }

    /// Called when this instance's wait signal fired first
    ///
    /// Returning an error aborts the retry loop with that error.
    fn on_wait_expired(&mut self, err: &Error, action: &str) -> Result<()> {
        let _ = (err, action);
        Ok(())
    }
}

impl<S: Strategy + ?Sized> Strategy for std::sync::Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn instantiate(&self) -> Box<dyn StrategyInstance> {
        (**self).instantiate()
    }
}
