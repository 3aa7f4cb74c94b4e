//! Bounded retry and polling with a growing delay
//!
//! Kept apart from recognition itself: the pipeline never retries, the host
//! decides what is worth retrying (engine bootstrap, model downloads).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included; treated as at least 1
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt
    ///
    /// `initial_delay * backoff_factor^(attempt - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.max(1.0).powi(exponent);

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Result of one poll: done, or not yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    Ready(T),
    Pending,
}

#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    #[error("gave up after {attempts} attempt(s)")]
    Exhausted {
        attempts: u32,
        /// Most recent error, if any attempt failed rather than stayed pending
        last_error: Option<E>,
    },
}

/// Call `op(attempt)` until it is ready, waiting between attempts
///
/// Errors and `Pending` both count as an attempt. Gives up after
/// `policy.max_attempts` calls.
pub async fn poll_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, PollError<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, E>>,
{
    let max_attempts = policy.attempts();
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match op(attempt).await {
            Ok(PollStatus::Ready(value)) => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}", label, attempt);
                }
                return Ok(value);
            }
            Ok(PollStatus::Pending) => {
                tracing::debug!("{} not ready (attempt {}/{})", label, attempt, max_attempts);
            }
            Err(err) => {
                tracing::warn!(
                    "{} attempt {}/{} failed: {}",
                    label,
                    attempt,
                    max_attempts,
                    err
                );
                last_error = Some(err);
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(policy.delay_for(attempt)).await;
        }
    }

    tracing::warn!("{} gave up after {} attempt(s)", label, max_attempts);
    Err(PollError::Exhausted {
        attempts: max_attempts,
        last_error,
    })
}

/// Retry a fallible operation; every error counts as an attempt
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, PollError<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    poll_with_backoff(policy, label, |attempt| {
        let fut = op(attempt);
        async move { fut.await.map(PollStatus::Ready) }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_delay_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(500));
    }

    #[test]
    fn test_shrinking_factor_is_treated_as_constant() {
        let policy = RetryPolicy {
            backoff_factor: 0.5,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(3), policy.initial_delay);
    }

    #[tokio::test]
    async fn test_poll_returns_when_ready() {
        let calls = AtomicU32::new(0);

        let value = assert_ok!(
            poll_with_backoff(&quick(5), "poll", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Ok::<_, String>(PollStatus::Pending)
                    } else {
                        Ok(PollStatus::Ready(attempt * 10))
                    }
                }
            })
            .await
        );

        assert_eq!(value, 30);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_respects_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = poll_with_backoff(&quick(4), "poll", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(PollStatus::Pending) }
        })
        .await;

        match result {
            Err(PollError::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 4);
                assert!(last_error.is_none());
            }
            Ok(()) => panic!("pending poll reported ready"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_keeps_last_error() {
        let result: Result<(), _> = retry_with_backoff(&quick(3), "retry", |attempt| async move {
            Err(format!("failure {}", attempt))
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "gave up after 3 attempt(s)");
        let PollError::Exhausted {
            attempts,
            last_error,
        } = err;
        assert_eq!(attempts, 3);
        assert_eq!(last_error.as_deref(), Some("failure 3"));
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failure() {
        let value = assert_ok!(
            retry_with_backoff(&quick(3), "retry", |attempt| async move {
                if attempt == 1 {
                    Err("model download interrupted")
                } else {
                    Ok("ready")
                }
            })
            .await
        );

        assert_eq!(value, "ready");
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);

        let result = retry_with_backoff(&quick(0), "retry", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("down") }
        })
        .await;

        assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
