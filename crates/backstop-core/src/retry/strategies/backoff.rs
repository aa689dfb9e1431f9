//! Wait strategies

use std::time::Duration;

use rand::RngExt;

use crate::error::Error;
use crate::retry::strategy::{Capabilities, Strategy, StrategyInstance, WaitHandle};

/// Initial delay used by [`ExponentialBackoff::new`]
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Wait between attempts, growing the delay by a constant factor
///
/// # Example
///
/// ```rust
/// use backstop_core::retry::ExponentialBackoff;
/// use std::time::Duration;
///
/// let backoff = ExponentialBackoff::new(2.0)
///     .with_initial_delay(Duration::from_millis(100))
///     .with_max_delay(Duration::from_secs(10));
///
/// assert_eq!(backoff.delay_for(1), Duration::from_millis(100));
/// assert_eq!(backoff.delay_for(3), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    factor: f64,
    initial_delay: Duration,
    max_delay: Option<Duration>,
    jitter: bool,
}

impl ExponentialBackoff {
    /// Backoff starting at one second and multiplying by `factor` after each wait
    ///
    /// Factors below 1.0 are clamped to 1.0 so the delay never shrinks.
    pub fn new(factor: f64) -> Self {
        Self {
            factor: if factor.is_finite() { factor.max(1.0) } else { 1.0 },
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: None,
            jitter: false,
        }
    }

    /// Set the first delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Cap the delay
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Add up to 25% random delay to spread out concurrent callers
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the `wait`-th wait (1-indexed), without jitter
    pub fn delay_for(&self, wait: u32) -> Duration {
        let exponent = wait.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.factor.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

impl Strategy for ExponentialBackoff {
    fn name(&self) -> &'static str {
        "exponential-backoff"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::WAIT
    }

    fn instantiate(&self) -> Box<dyn StrategyInstance> {
        Box::new(ExponentialBackoffInstance {
            config: *self,
            waits: 0,
        })
    }
}

struct ExponentialBackoffInstance {
    config: ExponentialBackoff,
    waits: u32,
}

impl StrategyInstance for ExponentialBackoffInstance {
    fn wait(&mut self, _err: &Error) -> Option<WaitHandle> {
        self.waits = self.waits.saturating_add(1);
        let delay = self.config.delay_for(self.waits);
        let delay = if self.config.jitter {
            with_jitter(delay)
        } else {
            delay
        };
        Some(WaitHandle::after(delay))
    }
}

/// Wait a constant delay between attempts
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    /// Constant delay of `delay`
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Strategy for FixedDelay {
    fn name(&self) -> &'static str {
        "fixed-delay"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::WAIT
    }

    fn instantiate(&self) -> Box<dyn StrategyInstance> {
        Box::new(*self)
    }
}

impl StrategyInstance for FixedDelay {
    fn wait(&mut self, _err: &Error) -> Option<WaitHandle> {
        Some(WaitHandle::after(self.delay))
    }
}

/// Add up to 25% random variation on top of `delay`
fn with_jitter(delay: Duration) -> Duration {
    let millis = delay.as_millis().min(u64::MAX as u128) as u64;
    if millis == 0 {
        return delay;
    }
    let jitter = rand::rng().random_range(0..=millis / 4);
    delay.saturating_add(Duration::from_millis(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles() {
        let backoff = ExponentialBackoff::new(2.0);

        assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(4));
        assert_eq!(backoff.delay_for(4), Duration::from_secs(8));
    }

    #[test]
    fn test_custom_factor_and_initial_delay() {
        let backoff = ExponentialBackoff::new(3.0).with_initial_delay(Duration::from_millis(100));

        assert_eq!(backoff.delay_for(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(300));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(900));
    }

    #[test]
    fn test_max_delay_cap() {
        let backoff = ExponentialBackoff::new(10.0).with_max_delay(Duration::from_secs(5));

        assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(5));
        assert_eq!(backoff.delay_for(50), Duration::from_secs(5));
    }

    #[test]
    fn test_huge_exponent_saturates() {
        let backoff = ExponentialBackoff::new(2.0);
        assert_eq!(backoff.delay_for(u32::MAX), Duration::MAX);
    }

    #[test]
    fn test_factor_below_one_is_clamped() {
        let backoff = ExponentialBackoff::new(0.5);
        assert_eq!(backoff.delay_for(3), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..1000 {
            let delay = with_jitter(Duration::from_millis(1000));
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1250));
        }
        assert_eq!(with_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instance_grows_between_waits() {
        let mut instance = ExponentialBackoff::new(2.0)
            .with_initial_delay(Duration::from_millis(10))
            .instantiate();
        let err = Error::transient("unavailable");

        for expected in [10u64, 20, 40] {
            let start = tokio::time::Instant::now();
            instance.wait(&err).expect("backoff always waits").await;
            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_millis(expected));
            assert!(elapsed < Duration::from_millis(expected + 5));
        }
    }
}
