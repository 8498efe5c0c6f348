use std::sync::Arc;

/// How a command or build ended, for metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
}

impl Outcome {
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Timeout => "timeout",
        }
    }
}

/// Notable worker pool transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolEvent {
    /// A new pooled worker was created.
    Spawned,
    /// An idle worker was claimed again.
    Reused,
    /// A worker was terminated and removed from the pool.
    Evicted,
    /// The wait ceiling elapsed and a temporary worker was created.
    Saturated,
}

impl PoolEvent {
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolEvent::Spawned => "spawned",
            PoolEvent::Reused => "reused",
            PoolEvent::Evicted => "evicted",
            PoolEvent::Saturated => "saturation",
        }
    }
}

/// Counter/histogram sink for engine activity.
///
/// Implementations are injected through [`crate::EngineContext`] and must be cheap:
/// they are called on the hot path of every command.
pub trait MetricsBackend: Send + Sync + 'static {
    /// A command was handed to a worker.
    ///
    /// # Arguments
    /// - `operation`: operation type the command belongs to
    fn record_command_started(&self, operation: &str);
    /// A command finished.
    ///
    /// # Arguments
    /// - `operation`: operation type the command belongs to
    /// - `outcome`: how the process ended
    /// - `duration_ms`: wall-clock run time
    fn record_command_completed(&self, operation: &str, outcome: Outcome, duration_ms: u64);
    /// A pool transition happened.
    fn record_pool_event(&self, event: PoolEvent);
    /// A top-level build request finished, retries included.
    fn record_build(&self, operation: &str, outcome: Outcome, duration_ms: u64);
}

/// Shared handle to a metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
