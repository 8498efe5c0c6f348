//! Metric helpers for command execution.

use kiln_core::metrics::Outcome;
use kiln_model::CommandOutput;

use crate::ExecError;

/// Executor name reported in logs and diagnostics.
pub const EXECUTOR_WORKER_POOL: &str = "worker-pool";

/// Label value for the `worker` tag on temporary (unpooled) workers.
pub const WORKER_KIND_TEMPORARY: &str = "temporary";

/// Label value for the `worker` tag on pooled workers.
pub const WORKER_KIND_POOLED: &str = "pooled";

/// Map a process run onto a metrics outcome.
pub fn run_outcome(res: &Result<CommandOutput, ExecError>) -> Outcome {
    match res {
        Ok(out) if out.success => Outcome::Success,
        Err(ExecError::TimedOut { .. }) => Outcome::Timeout,
        _ => Outcome::Failure,
    }
}
