//! Session recovery on expired credentials

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, ErrorKind, Result};
use crate::retry::strategy::{Capabilities, Recovery, Strategy, StrategyInstance};

/// A remote session that can be re-established
///
/// Implementations shared between concurrent retry calls must synchronize
/// reconnects themselves.
#[async_trait]
pub trait Session: Send + Sync {
    /// Re-authenticate and replace the session's credentials
    async fn reconnect(&self) -> Result<()>;
}

/// Reconnect the session when an error reports an expired grant
#[derive(Clone)]
pub struct ReconnectOnAuthExpiry {
    session: Arc<dyn Session>,
}

impl ReconnectOnAuthExpiry {
    /// Reconnect `session` on `ErrorKind::InvalidGrant`
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self { session }
    }
}

impl std::fmt::Debug for ReconnectOnAuthExpiry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectOnAuthExpiry").finish_non_exhaustive()
    }
}

impl Strategy for ReconnectOnAuthExpiry {
    fn name(&self) -> &'static str {
        "reconnect-on-auth-expiry"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::RECOVER
    }

    fn instantiate(&self) -> Box<dyn StrategyInstance> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl StrategyInstance for ReconnectOnAuthExpiry {
    async fn recover(&mut self, err: &Error) -> Recovery {
        if !err.has_kind(ErrorKind::InvalidGrant) {
            return Recovery::NotApplicable;
        }
        tracing::debug!(error = %err, "credentials expired, reconnecting");
        match self.session.reconnect().await {
            Ok(()) => Recovery::Recovered,
            Err(reconnect_err) => Recovery::Failed(Error::wrap(
                ErrorKind::InvalidGrant,
                reconnect_err,
                "failed to reconnect after credentials expired",
            )),
        }
    }
}
