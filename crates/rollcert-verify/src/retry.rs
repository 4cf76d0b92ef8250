//! Retry/backoff wait driver
//!
//! A generic "poll until the condition holds or the deadline elapses"
//! primitive with a configurable initial delay, poll interval, and
//! overall timeout. Every wait in the engine goes through this driver.
//!
//! Timeouts are ordinary values (`WaitOutcome::TimedOut`), not
//! exceptions-as-control-flow; only non-transient condition errors
//! abort a wait early.

use crate::error::VerifyError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Wait configuration shared read-only across all waits of a run
///
/// A value object; never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first condition evaluation
    pub initial_delay: Duration,
    /// Delay between condition evaluations
    pub poll_interval: Duration,
    /// Overall deadline for the wait
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Create a policy with explicit delays
    #[inline]
    #[must_use]
    pub fn new(initial_delay: Duration, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            initial_delay,
            poll_interval,
            timeout,
        }
    }

    /// With a different initial delay
    #[inline]
    #[must_use]
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// With a different poll interval
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// With a different overall timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the policy is usable
    ///
    /// # Errors
    /// - `VerifyError::Configuration` for a zero poll interval or timeout
    pub fn validate(&self) -> Result<(), VerifyError> {
        if self.poll_interval.is_zero() {
            return Err(VerifyError::Configuration(
                "poll interval must be non-zero".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(VerifyError::Configuration(
                "timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    /// The standard policy: 2s initial delay, 10s poll interval,
    /// 5 minute timeout.
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Outcome of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition held before the deadline
    Satisfied,
    /// The deadline elapsed without the condition holding
    TimedOut,
}

impl WaitOutcome {
    /// Whether the condition was satisfied
    #[inline]
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}

/// Poll `condition` until it holds or the policy's timeout elapses
///
/// Semantics: sleep `initial_delay`, then repeatedly evaluate the
/// condition; once the cumulative elapsed time exceeds `timeout` the
/// wait returns `TimedOut` without further evaluation. Transient
/// condition errors are swallowed and retried like an unsatisfied
/// condition; non-transient errors propagate immediately and abort
/// the wait.
///
/// The only suspension points are tokio sleeps, so aborting the owning
/// task tears the wait down promptly.
///
/// # Errors
/// Returns the first non-transient error raised by the condition.
pub async fn wait_until<F, Fut>(
    policy: &RetryPolicy,
    mut condition: F,
) -> Result<WaitOutcome, VerifyError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, VerifyError>>,
{
    let started = Instant::now();
    sleep(policy.initial_delay).await;

    loop {
        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "Wait timed out");
            return Ok(WaitOutcome::TimedOut);
        }

        match condition().await {
            Ok(true) => return Ok(WaitOutcome::Satisfied),
            Ok(false) => {
                let remaining = policy.timeout.saturating_sub(started.elapsed());
                tracing::debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    remaining_ms = remaining.as_millis() as u64,
                    "Condition not yet satisfied"
                );
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(error = %err, "Transient failure during wait, retrying");
            }
            Err(err) => return Err(err),
        }

        sleep(policy.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcert_cluster::TransportError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(0),
            Duration::from_millis(100),
            Duration::from_secs(5),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn satisfied_immediately() {
        let outcome = wait_until(&fast_policy(), || async { Ok(true) })
            .await
            .unwrap();
        assert!(outcome.is_satisfied());
    }

    #[tokio::test(start_paused = true)]
    async fn satisfied_after_retries() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let outcome = wait_until(&fast_policy(), move || {
            let counter = Arc::clone(&counter);
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) >= 3) }
        })
        .await
        .unwrap();

        assert_eq!(outcome, WaitOutcome::Satisfied);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_near_deadline_not_earlier_not_indefinitely() {
        let policy = RetryPolicy::new(
            Duration::from_millis(0),
            Duration::from_secs(5),
            Duration::from_secs(60),
        );
        let started = Instant::now();

        let outcome = wait_until(&policy, || async { Ok(false) }).await.unwrap();

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(!outcome.is_satisfied());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(60), "ended early: {elapsed:?}");
        assert!(elapsed <= Duration::from_secs(66), "ended late: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn honors_initial_delay() {
        let policy = RetryPolicy::new(
            Duration::from_secs(2),
            Duration::from_millis(100),
            Duration::from_secs(5),
        );
        let started = Instant::now();

        let outcome = wait_until(&policy, || async { Ok(true) }).await.unwrap();

        assert_eq!(outcome, WaitOutcome::Satisfied);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_swallowed() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let outcome = wait_until(&fast_policy(), move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(VerifyError::from(TransportError::new("api unreachable")))
                } else {
                    Ok(true)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome, WaitOutcome::Satisfied);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_abort_the_wait() {
        let result = wait_until(&fast_policy(), || async {
            Err(VerifyError::Configuration("broken".to_string()))
        })
        .await;

        assert!(matches!(result, Err(VerifyError::Configuration(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_shorter_than_initial_delay_skips_evaluation() {
        let policy = RetryPolicy::new(
            Duration::from_secs(10),
            Duration::from_secs(1),
            Duration::from_secs(5),
        );
        let evaluated = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&evaluated);

        let outcome = wait_until(&policy, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert_eq!(evaluated.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn policy_validation() {
        assert!(RetryPolicy::default().validate().is_ok());

        let zero_interval = RetryPolicy::default().with_poll_interval(Duration::ZERO);
        assert!(matches!(
            zero_interval.validate(),
            Err(VerifyError::Configuration(_))
        ));

        let zero_timeout = RetryPolicy::default().with_timeout(Duration::ZERO);
        assert!(matches!(
            zero_timeout.validate(),
            Err(VerifyError::Configuration(_))
        ));
    }

    #[test]
    fn default_policy_matches_standard_constants() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.initial_delay, Duration::from_secs(2));
        assert_eq!(policy.poll_interval, Duration::from_secs(10));
        assert_eq!(policy.timeout, Duration::from_secs(300));
    }
}
