// =============================================================================
// retry.rs — TRY, WAIT, TRY AGAIN
// =============================================================================
//
// The vendor UI is an Angular app behind a slow API. Sometimes the grid
// doesn't render, sometimes navigation times out, sometimes it renders an
// empty table and changes its mind a second later. So each report gets a
// few attempts, with a pause that grows linearly between them:
// base, 2 x base, 3 x base...
//
// Two ways to run out of attempts:
// - every attempt errored: the caller gets a RetryError with the count
// - every attempt came back empty: the caller gets Ok(None), no error
// =============================================================================

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// How many times to try and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Pause after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Every attempt failed with an error; `last_error` is the final one.
#[derive(Debug, Error)]
#[error("{last_error} (após {attempts} tentativas)")]
pub struct RetryError<E> {
    pub attempts: u32,
    #[source]
    pub last_error: E,
}

/// Run `op` until it yields data or the policy runs out.
///
/// `op` receives the 1-based attempt number. `Ok(None)` means "worked, but
/// nothing there" and is retried like an error; if it is still empty on the
/// last attempt the empty outcome is accepted and `Ok(None)` is returned.
pub async fn with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<Option<T>, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(Some(value)) => {
                if attempt > 1 {
                    debug!(label = label, attempt = attempt, "Succeeded after retrying");
                }
                return Ok(Some(value));
            }
            Ok(None) if attempt >= max_attempts => {
                warn!(label = label, attempts = attempt, "Still empty after final attempt");
                return Ok(None);
            }
            Err(e) if attempt >= max_attempts => {
                warn!(label = label, attempts = attempt, error = %e, "Giving up");
                return Err(RetryError {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Ok(None) => {
                debug!(label = label, attempt = attempt, "Empty result, will retry");
            }
            Err(e) => {
                warn!(
                    label = label,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    "Attempt failed, will retry"
                );
            }
        }

        tokio::time::sleep(policy.delay_after(attempt)).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_op_is_called_max_attempts_times() {
        let calls: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
        let policy = RetryPolicy::new(3, Duration::from_millis(2000));

        let outcome: Result<Option<()>, RetryError<String>> = with_retry(policy, "report 1", |_| {
            let calls = calls.clone();
            async move {
                calls.lock().push(Instant::now());
                Err("timeout".to_string())
            }
        })
        .await;

        let err = outcome.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.to_string(), "timeout (após 3 tentativas)");

        let calls = calls.lock();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_millis(2000));
        assert_eq!(calls[2] - calls[1], Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_second_attempt() {
        let outcome: Result<Option<u32>, RetryError<String>> =
            with_retry(RetryPolicy::new(3, Duration::from_millis(10)), "r", |attempt| async move {
                if attempt == 1 {
                    Err("flaky".to_string())
                } else {
                    Ok(Some(attempt))
                }
            })
            .await;
        assert_eq!(outcome.unwrap(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_results_exhaust_silently() {
        let calls = Arc::new(Mutex::new(0u32));
        let outcome: Result<Option<u32>, RetryError<String>> =
            with_retry(RetryPolicy::new(3, Duration::from_millis(10)), "r", |_| {
                let calls = calls.clone();
                async move {
                    *calls.lock() += 1;
                    Ok(None)
                }
            })
            .await;
        assert_eq!(outcome.unwrap(), None);
        assert_eq!(*calls.lock(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_then_data_is_a_success() {
        let outcome: Result<Option<&str>, RetryError<String>> =
            with_retry(RetryPolicy::new(3, Duration::from_millis(10)), "r", |attempt| async move {
                Ok((attempt == 3).then_some("data"))
            })
            .await;
        assert_eq!(outcome.unwrap(), Some("data"));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
    }
}
