//! Bounded retry with backoff.
//!
//! [`RetryExecutor`] drives any fallible async operation under a
//! [`RetryPolicy`]. Delays go through a [`Sleeper`], so the backoff sequence
//! is observable in tests without waiting on a clock.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base`, `2 * base`, `4 * base`, ...
    Exponential {
        /// Delay after the first failed attempt.
        base: Duration,
    },
    /// The same delay after every failed attempt.
    Fixed(Duration),
    /// `step`, `2 * step`, `3 * step`, ...
    Linear {
        /// Increment added per failed attempt.
        step: Duration,
    },
}

impl Backoff {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            Self::Exponential { base } => {
                base.saturating_mul(2u32.saturating_pow(attempt - 1))
            }
            Self::Fixed(delay) => delay,
            Self::Linear { step } => step.saturating_mul(attempt),
        }
    }
}

/// Attempt budget and backoff shape for one kind of operation.
///
/// # Example
///
/// ```rust
/// use endpoint_agent_installer::{Backoff, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy {
///     max_attempts: 3,
///     backoff: Backoff::Exponential { base: Duration::from_secs(1) },
/// };
/// assert_eq!(
///     policy.delays(),
///     vec![Duration::from_secs(1), Duration::from_secs(2)]
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,

    /// Delay shape between attempts.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Policy for release metadata and artifact downloads: 3 attempts, 2s doubling.
    pub const fn network() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                base: Duration::from_secs(2),
            },
        }
    }

    /// Policy for optional component installers: 3 attempts, fixed 5s apart.
    pub const fn component() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(5)),
        }
    }

    /// The sleeps a run that exhausts every attempt would perform, in order.
    ///
    /// There is one fewer delay than attempts: nothing sleeps after the last.
    pub fn delays(&self) -> Vec<Duration> {
        (1..self.max_attempts.max(1))
            .map(|attempt| self.backoff.delay_after(attempt))
            .collect()
    }

    /// Total time spent sleeping when every attempt fails.
    pub fn total_delay(&self) -> Duration {
        self.delays().into_iter().sum()
    }
}

/// Blocking pause between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Pause for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// All attempts failed.
#[derive(Debug, Error)]
#[error("gave up after {attempts} attempt(s): {last_error}")]
pub struct RetryError<E> {
    /// Number of attempts made.
    pub attempts: u32,
    /// Error returned by the final attempt.
    pub last_error: E,
}

/// Runs operations under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryExecutor {
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor").finish_non_exhaustive()
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(Arc::new(TokioSleeper))
    }
}

impl RetryExecutor {
    /// Create an executor that pauses through `sleeper`.
    pub fn new(sleeper: Arc<dyn Sleeper>) -> Self {
        Self { sleeper }
    }

    /// Run `operation` until it succeeds or the policy's attempts are spent.
    ///
    /// The closure receives the 1-based attempt number. On failure the
    /// executor sleeps for the policy's delay before the next attempt; it
    /// never sleeps after the final attempt.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(%label, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt >= max_attempts => {
                    tracing::warn!(%label, attempt, error = %err, "giving up");
                    return Err(RetryError {
                        attempts: attempt,
                        last_error: err,
                    });
                }
                Err(err) => {
                    let delay = policy.backoff.delay_after(attempt);
                    tracing::warn!(
                        %label,
                        attempt,
                        max_attempts,
                        ?delay,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSleeper;
    use std::cell::Cell;

    fn executor() -> (RetryExecutor, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        (RetryExecutor::new(sleeper.clone()), sleeper)
    }

    #[test]
    fn test_exponential_delays() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
        };
        assert_eq!(backoff.delay_after(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_after(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_after(3), Duration::from_millis(400));
    }

    #[test]
    fn test_fixed_and_linear_delays() {
        let fixed = Backoff::Fixed(Duration::from_secs(5));
        assert_eq!(fixed.delay_after(1), Duration::from_secs(5));
        assert_eq!(fixed.delay_after(4), Duration::from_secs(5));

        let linear = Backoff::Linear {
            step: Duration::from_secs(2),
        };
        assert_eq!(linear.delay_after(1), Duration::from_secs(2));
        assert_eq!(linear.delay_after(3), Duration::from_secs(6));
    }

    #[test]
    fn test_policy_total_delay() {
        assert_eq!(RetryPolicy::network().total_delay(), Duration::from_secs(6));
        assert_eq!(RetryPolicy::component().total_delay(), Duration::from_secs(10));
        let single = RetryPolicy {
            max_attempts: 1,
            backoff: Backoff::Fixed(Duration::from_secs(9)),
        };
        assert!(single.delays().is_empty());
    }

    #[tokio::test]
    async fn test_succeeds_after_n_minus_one_failures() {
        let (executor, sleeper) = executor();
        let policy = RetryPolicy {
            max_attempts: 4,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(10),
            },
        };
        let calls = Cell::new(0u32);

        let result = executor
            .run("flaky", &policy, |attempt| {
                calls.set(calls.get() + 1);
                async move {
                    if attempt < 4 {
                        Err(format!("failure {attempt}"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.get(), 4);
        assert_eq!(
            sleeper.recorded(),
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(40)
            ]
        );
    }

    #[tokio::test]
    async fn test_no_sleep_after_final_failure() {
        let (executor, sleeper) = executor();
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(5)),
        };

        let result: Result<(), _> = executor
            .run("always-fails", &policy, |_| async { Err("boom") })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_error, "boom");
        assert_eq!(sleeper.recorded(), policy.delays());
        assert_eq!(sleeper.recorded().len(), 2);
    }

    #[tokio::test]
    async fn test_first_attempt_success_never_sleeps() {
        let (executor, sleeper) = executor();
        let result: Result<u8, RetryError<String>> = executor
            .run("ok", &RetryPolicy::network(), |_| async { Ok(7) })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let (executor, sleeper) = executor();
        let policy = RetryPolicy {
            max_attempts: 0,
            backoff: Backoff::Fixed(Duration::from_secs(1)),
        };
        let calls = Cell::new(0u32);
        let result: Result<(), _> = executor
            .run("zero", &policy, |_| {
                calls.set(calls.get() + 1);
                async { Err("nope") }
            })
            .await;
        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.get(), 1);
        assert!(sleeper.recorded().is_empty());
    }
}
