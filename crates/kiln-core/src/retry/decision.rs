use std::time::Duration;

use tracing::warn;

use kiln_model::ErrorClass;

/// What the retry controller does after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given delay, then try again.
    RetryAfter(Duration),
    /// Stop and hand the error back to the caller.
    Fail {
        /// `true` when the error was retryable but no attempts are left.
        exhausted: bool,
    },
}

impl RetryDecision {
    pub fn is_retry(&self) -> bool {
        matches!(self, RetryDecision::RetryAfter(_))
    }
}

/// One iteration of a retry loop. Only ever logged.
#[derive(Debug, Clone)]
pub struct OperationAttempt<'a> {
    pub attempt: u32,
    pub operation_type: &'a str,
    pub delay_before_next: Option<Duration>,
    pub classified: Option<ErrorClass>,
}

impl OperationAttempt<'_> {
    pub(crate) fn log_retry(&self, error: &dyn std::error::Error) {
        warn!(
            operation_type = self.operation_type,
            attempt = self.attempt,
            delay_ms = self.delay_before_next.map(|d| d.as_millis() as u64),
            class = self.classified.map(|c| c.as_label()),
            error = %error,
            "attempt failed; retrying",
        );
    }
}
