//! # backstop-core
//!
//! Retry engine for flaky remote operations:
//! - Composable retry strategies (attempt limits, deadlines, backoff,
//!   cancellation, error classification, credential recovery)
//! - Typed error taxonomy deciding what may be retried
//! - Layered retry configuration (embedded defaults, user file, environment)
//! - Redacting diagnostics and endpoint routing for HTTP-backed operations
//! - OpenID Connect token acquisition with retried requests
//!
//! ```rust
//! use backstop_core::{Error, ErrorKind};
//!
//! let err = Error::pending("disk is still attaching");
//! assert_eq!(err.kind(), ErrorKind::Pending);
//! assert!(err.can_auto_retry());
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod retry;
pub mod routing;
pub mod token;
pub mod utils;

pub use config::{ConfigLoader, RetryConfig, RetryDefaults};
pub use error::{Error, ErrorKind, Result};
pub use retry::{retry, RetryEngine, StrategySet};
pub use utils::get_home_dir;
