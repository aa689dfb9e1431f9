//! Run command
//!
//! Executes an external command under the retry engine. Each attempt spawns
//! the command afresh; its exit status is mapped onto the error taxonomy so
//! the standard classifier decides whether another attempt is worthwhile.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use backstop_core::config::RetryDefaults;
use backstop_core::retry::{Cancellation, RetryEngine, StrategySet};
use backstop_core::Error;
use camino::Utf8Path;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::cli::RunArgs;
use crate::output;

pub async fn run(args: RunArgs, config_dir: Option<&Utf8Path>) -> Result<()> {
    let program = args
        .command
        .first()
        .ok_or_else(|| anyhow!("No command given after --"))?;
    let config = super::config::loader(config_dir)?.load()?;

    let action = args
        .action
        .clone()
        .unwrap_or_else(|| format!("running {}", program));
    let defaults = apply_overrides(config.for_action(&action), &args)?;
    tracing::debug!(action = %action, ?defaults, "Resolved retry defaults");

    let token = CancellationToken::new();
    let listener = tokio::spawn(cancel_on_ctrl_c(token.clone()));
    let strategies = strategy_set(&defaults, token);

    let result = RetryEngine::new()
        .run(&action, &strategies, || run_once(&args.command, &args.retry_on))
        .await;

    listener.abort();
    result?;
    Ok(())
}

/// Layer command-line flags over the configured defaults
fn apply_overrides(mut defaults: RetryDefaults, args: &RunArgs) -> Result<RetryDefaults> {
    if let Some(max_attempts) = args.max_attempts {
        defaults.max_attempts = max_attempts;
    }
    if let Some(timeout) = args.timeout {
        defaults.timeout_secs = timeout;
    }
    if let Some(backoff) = args.backoff {
        if !backoff.is_finite() || backoff < 1.0 {
            return Err(anyhow!("--backoff must be at least 1.0, got {}", backoff));
        }
        defaults.backoff_factor = backoff;
    }
    if let Some(delay) = args.delay {
        defaults.initial_delay_ms = delay;
    }
    Ok(defaults)
}

/// Cancellation first, so an interrupted run reports the interruption
/// rather than the failure of the killed child.
fn strategy_set(defaults: &RetryDefaults, token: CancellationToken) -> StrategySet {
    let mut strategies = StrategySet::new().with(Cancellation::new(token));
    for strategy in StrategySet::new().with_defaults(defaults).iter() {
        strategies.push(Arc::clone(strategy));
    }
    strategies
}

async fn cancel_on_ctrl_c(token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        output::warning("Interrupted, cancelling retries");
        token.cancel();
    }
}

async fn run_once(command: &[String], retry_on: &[i32]) -> std::result::Result<(), Error> {
    let (program, rest) = command
        .split_first()
        .ok_or_else(|| Error::bad_argument("no command given"))?;

    let status = Command::new(program)
        .args(rest)
        .status()
        .await
        .map_err(|e| {
            let err = Error::from(e);
            Error::wrap(err.kind(), err, format!("failed to start {}", program))
        })?;

    if status.success() {
        return Ok(());
    }
    Err(classify_exit(program, status.code(), retry_on))
}

/// Map a failed exit status onto the error taxonomy
fn classify_exit(program: &str, code: Option<i32>, retry_on: &[i32]) -> Error {
    match code {
        Some(code) if retry_on.is_empty() || retry_on.contains(&code) => {
            Error::transient(format!("{} exited with status {}", program, code))
        }
        Some(code) => Error::bad_argument(format!(
            "{} exited with status {}, which is not retryable",
            program, code
        )),
        None => Error::unidentified(format!("{} was terminated by a signal", program)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backstop_core::ErrorKind;

    fn args(command: &[&str]) -> RunArgs {
        RunArgs {
            action: None,
            max_attempts: None,
            timeout: None,
            backoff: None,
            delay: None,
            retry_on: Vec::new(),
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_classify_exit() {
        assert_eq!(classify_exit("curl", Some(7), &[]).kind(), ErrorKind::Transient);
        assert_eq!(classify_exit("curl", Some(7), &[7, 28]).kind(), ErrorKind::Transient);

        let err = classify_exit("curl", Some(22), &[7, 28]);
        assert_eq!(err.kind(), ErrorKind::BadArgument);
        assert!(!err.can_auto_retry());
        assert!(err.to_string().contains("status 22"));

        assert_eq!(classify_exit("curl", None, &[]).kind(), ErrorKind::Unidentified);
    }

    #[test]
    fn test_apply_overrides() {
        let mut run_args = args(&["true"]);
        run_args.max_attempts = Some(2);
        run_args.timeout = Some(0);
        run_args.delay = Some(50);

        let defaults = apply_overrides(RetryDefaults::default(), &run_args).unwrap();
        assert_eq!(defaults.max_attempts, 2);
        assert_eq!(defaults.timeout_secs, 0);
        assert_eq!(defaults.initial_delay_ms, 50);
        assert_eq!(defaults.backoff_factor, 2.0);
    }

    #[test]
    fn test_backoff_below_one_rejected() {
        let mut run_args = args(&["true"]);
        run_args.backoff = Some(0.5);
        assert!(apply_overrides(RetryDefaults::default(), &run_args).is_err());
    }

    #[test]
    fn test_strategy_set_puts_cancellation_first() {
        let set = strategy_set(&RetryDefaults::default(), CancellationToken::new());
        assert_eq!(
            format!("{:?}", set),
            r#"["cancellation", "exponential-backoff", "max-attempts", "per-call-deadline", "error-classifier"]"#
        );
        assert!(set.validate().is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_once_maps_outcomes() {
        assert!(run_once(&args(&["true"]).command, &[]).await.is_ok());

        let err = run_once(&args(&["false"]).command, &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);

        let err = run_once(&args(&["/nonexistent/backstop-test-binary"]).command, &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().starts_with("failed to start"));
    }
}
