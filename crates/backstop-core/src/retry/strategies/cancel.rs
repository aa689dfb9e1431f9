//! External cancellation

use tokio_util::sync::CancellationToken;

use crate::error::{Error, ErrorKind, Result};
use crate::retry::strategy::{Capabilities, Strategy, StrategyInstance, WaitHandle};

/// Abort the retry loop when a token is cancelled
///
/// The token's cancellation doubles as a wait signal, so a cancelled token
/// wakes the engine early instead of letting it sleep out a long backoff.
#[derive(Debug, Clone)]
pub struct Cancellation {
    token: CancellationToken,
}

impl Cancellation {
    /// Watch the given token
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Strategy for Cancellation {
    fn name(&self) -> &'static str {
        "cancellation"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::TIMEOUT
    }

    fn instantiate(&self) -> Box<dyn StrategyInstance> {
        Box::new(CancellationInstance {
            token: self.token.clone(),
        })
    }
}

struct CancellationInstance {
    token: CancellationToken,
}

impl CancellationInstance {
    fn cancelled(err: &Error, action: &str) -> Error {
        Error::wrap(
            ErrorKind::Timeout,
            err.to_string(),
            format!("timeout while {}", action),
        )
    }
}

impl StrategyInstance for CancellationInstance {
    fn proceed(&mut self, err: &Error, action: &str) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Self::cancelled(err, action));
        }
        Ok(())
    }

    fn wait(&mut self, _err: &Error) -> Option<WaitHandle> {
        Some(WaitHandle::on_cancel(self.token.clone()))
    }

    fn on_wait_expired(&mut self, err: &Error, action: &str) -> Result<()> {
        Err(Self::cancelled(err, action))
    }
}
