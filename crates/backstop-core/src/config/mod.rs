//! Retry configuration loading
//!
//! Values come from the embedded defaults, the user's `config.yaml` and
//! `BACKSTOP_*` environment variables, in that order of precedence.

mod loader;
mod types;

pub use loader::{ConfigLoader, CONFIG_FILE_NAME};
pub use types::{RetryConfig, RetryDefaults, RetryOverrides};
