//! Standard retry strategies

mod attempts;
mod backoff;
mod cancel;
mod classifier;
mod deadline;
mod reconnect;

pub use attempts::MaxAttempts;
pub use backoff::{ExponentialBackoff, FixedDelay, DEFAULT_INITIAL_DELAY};
pub use cancel::Cancellation;
pub use classifier::{
    AlwaysRetry, ClosurePredicate, ErrorClassifier, MessagePredicate, NeverRetry, RetryPredicate,
};
pub use deadline::{PerCallDeadline, WallClockDeadline};
pub use reconnect::{ReconnectOnAuthExpiry, Session};
