//! Classification-driven retry controller.
//!
//! [`RetryPolicy::execute_with_retry`] runs an operation, classifies every failure
//! with [`crate::error::classify`] and either sleeps and retries or returns the
//! original error untouched.
mod decision;
pub use decision::{OperationAttempt, RetryDecision};

use std::{future::Future, time::Duration};

use tracing::{debug, error, info};

use kiln_model::{ErrorClass, RetryStrategy, UNKNOWN_ATTEMPT_CAP};

use crate::error::{BuildError, classify};

/// Upper bound for a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(600);

/// Resolved retry constants.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    first: Duration,
    factor: f64,
    unknown_max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_strategy(&RetryStrategy::default())
    }
}

impl RetryPolicy {
    pub fn from_strategy(s: &RetryStrategy) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            first: Duration::from_millis(s.first_ms),
            factor: if s.factor.is_finite() && s.factor >= 1.0 { s.factor } else { 1.0 },
            unknown_max_attempts: s.unknown_max_attempts.clamp(1, UNKNOWN_ATTEMPT_CAP),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after failed attempt `attempt` (1-based): `first * factor^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }

    /// Decide what follows failed attempt `attempt` (1-based) of class `class`.
    pub fn decide(&self, class: ErrorClass, attempt: u32) -> RetryDecision {
        let (eligible, cap) = match class {
            ErrorClass::CliFailure { retryable }
            | ErrorClass::PreviewFailure { retryable }
            | ErrorClass::ExportFailure { retryable } => (retryable, self.max_attempts),
            ErrorClass::ValidationFailure { recoverable } => (recoverable, self.max_attempts),
            ErrorClass::Unknown => (true, self.unknown_max_attempts.min(self.max_attempts)),
        };

        if !eligible {
            RetryDecision::Fail { exhausted: false }
        } else if attempt >= cap {
            RetryDecision::Fail { exhausted: true }
        } else {
            RetryDecision::RetryAfter(self.delay_for(attempt))
        }
    }

    /// Run `op` until it succeeds or the policy gives up.
    ///
    /// The error returned is the one produced by the last attempt, unchanged.
    /// Backoff sleeps suspend only the calling task.
    ///
    /// # Examples
    /// ```
    /// use kiln_core::retry::RetryPolicy;
    /// use kiln_core::error::BuildError;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let policy = RetryPolicy::default();
    /// let out = policy
    ///     .execute_with_retry(|| async { Ok::<_, BuildError>(42) }, "preview_build")
    ///     .await
    ///     .unwrap();
    /// assert_eq!(out, 42);
    /// # }
    /// ```
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        mut op: F,
        operation_type: &str,
    ) -> Result<T, BuildError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BuildError>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation_type, attempts = attempt, "operation recovered after retry");
                    } else {
                        debug!(operation_type, "operation succeeded on first attempt");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let class = classify(&err);
                    match self.decide(class, attempt) {
                        RetryDecision::RetryAfter(delay) => {
                            OperationAttempt {
                                attempt,
                                operation_type,
                                delay_before_next: Some(delay),
                                classified: Some(class),
                            }
                            .log_retry(&err);
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        RetryDecision::Fail { exhausted } => {
                            error!(
                                operation_type,
                                attempts = attempt,
                                class = class.as_label(),
                                exhausted,
                                error = %err,
                                "operation failed",
                            );
                            return Err(err);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        path::PathBuf,
        sync::{Arc, Mutex},
    };

    use tokio::time::Instant;

    use super::*;
    use crate::error::CliFailure;

    fn retryable_cli() -> BuildError {
        CliFailure::exited("gdexport", Some(1), "", "resource busy").into()
    }

    #[test]
    fn delays_double_from_base() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(1), Duration::from_secs(2));
        assert_eq!(p.delay_for(2), Duration::from_secs(4));
        assert_eq!(p.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn huge_attempt_numbers_are_capped() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(10_000), MAX_BACKOFF);
    }

    #[test]
    fn decide_respects_flags_and_caps() {
        let p = RetryPolicy::default();
        let cli = ErrorClass::CliFailure { retryable: true };

        assert!(p.decide(cli, 1).is_retry());
        assert!(p.decide(cli, 2).is_retry());
        assert_eq!(p.decide(cli, 3), RetryDecision::Fail { exhausted: true });

        assert_eq!(
            p.decide(ErrorClass::PreviewFailure { retryable: false }, 1),
            RetryDecision::Fail { exhausted: false }
        );
        assert!(p.decide(ErrorClass::ValidationFailure { recoverable: true }, 1).is_retry());

        assert!(p.decide(ErrorClass::Unknown, 1).is_retry());
        assert_eq!(p.decide(ErrorClass::Unknown, 2), RetryDecision::Fail { exhausted: true });
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_failures_use_all_attempts_with_doubling_delays() {
        let calls: Arc<Mutex<Vec<Instant>>> = Arc::default();
        let seen = Arc::clone(&calls);

        let res: Result<(), _> = RetryPolicy::default()
            .execute_with_retry(
                || {
                    seen.lock().unwrap().push(Instant::now());
                    async { Err(retryable_cli()) }
                },
                "preview_build",
            )
            .await;

        assert!(matches!(res, Err(BuildError::Cli(_))));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);

        let first_gap = calls[1] - calls[0];
        let second_gap = calls[2] - calls[1];
        assert!(first_gap >= Duration::from_secs(2) && first_gap < Duration::from_millis(2_100));
        assert!(second_gap >= Duration::from_secs(4) && second_gap < Duration::from_millis(4_100));
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_errors_retry_only_once() {
        let mut calls = 0u32;
        let res: Result<(), _> = RetryPolicy::default()
            .execute_with_retry(
                || {
                    calls += 1;
                    async { Err(BuildError::Internal("unexpected".into())) }
                },
                "export_build",
            )
            .await;

        assert!(matches!(res, Err(BuildError::Internal(_))));
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_is_returned_unchanged() {
        let mut calls = 0u32;
        let res: Result<(), _> = RetryPolicy::default()
            .execute_with_retry(
                || {
                    calls += 1;
                    async {
                        Err(BuildError::Preview {
                            message: "entry file missing".into(),
                            path: PathBuf::from("/out"),
                            logs: vec!["warn: empty scene".into()],
                            retryable: false,
                            source: None,
                        })
                    }
                },
                "preview_build",
            )
            .await;

        assert_eq!(calls, 1);
        match res {
            Err(BuildError::Preview { message, logs, .. }) => {
                assert_eq!(message, "entry file missing");
                assert_eq!(logs, vec!["warn: empty scene".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_retry_returns_value() {
        let mut calls = 0u32;
        let res = RetryPolicy::default()
            .execute_with_retry(
                || {
                    calls += 1;
                    let n = calls;
                    async move { if n < 3 { Err(retryable_cli()) } else { Ok(n) } }
                },
                "preview_build",
            )
            .await;

        assert_eq!(res.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_attempts_are_capped_even_when_configured_higher() {
        let policy = RetryPolicy::from_strategy(&RetryStrategy {
            max_attempts: 5,
            unknown_max_attempts: 3,
            ..Default::default()
        });
        let mut calls = 0u32;
        let res: Result<(), _> = policy
            .execute_with_retry(
                || {
                    calls += 1;
                    async { Err(BuildError::Internal("unexpected".into())) }
                },
                "preview_build",
            )
            .await;

        assert!(matches!(res, Err(BuildError::Internal(_))));
        assert_eq!(calls, 2);
    }

    #[test]
    fn from_strategy_sanitizes_values() {
        let p = RetryPolicy::from_strategy(&RetryStrategy {
            max_attempts: 0,
            first_ms: 10,
            factor: f64::NAN,
            unknown_max_attempts: 0,
        });
        assert_eq!(p.max_attempts(), 1);
        assert_eq!(p.delay_for(5), Duration::from_millis(10));
    }
}
