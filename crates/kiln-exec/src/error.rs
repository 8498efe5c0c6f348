use std::path::PathBuf;

use thiserror::Error;

use kiln_core::error::{BuildError, CliFailure};
use kiln_model::ModelError;

/// Failures of the subprocess layer itself.
///
/// A process that ran and exited non-zero is not an `ExecError`; it is reported
/// through [`kiln_model::CommandOutput::success`].
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid command: {0}")]
    InvalidCommand(#[from] ModelError),

    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout_ms}ms")]
    TimedOut {
        command: String,
        timeout_ms: u64,
        /// Output captured before the process was killed.
        stdout: String,
    },

    #[error("`{command}` was cancelled")]
    Cancelled { command: String },

    #[error("archiving {path:?} failed: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ExecResult<T> = Result<T, ExecError>;

impl From<ExecError> for BuildError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Spawn { command, source } => CliFailure::spawn_failed(command, source).into(),
            ExecError::TimedOut {
                command,
                timeout_ms,
                stdout,
            } => CliFailure::timed_out(command, timeout_ms, stdout).into(),
            ExecError::Cancelled { command } => CliFailure::pool_closed(command).into(),
            ExecError::Wait { command, source } => BuildError::io(format!("waiting for `{command}`"), source),
            ExecError::Io(source) => BuildError::io("running subprocess", source),
            ExecError::InvalidCommand(e) => BuildError::Internal(e.to_string()),
            other @ (ExecError::InvalidConfig(_) | ExecError::Archive { .. }) => {
                BuildError::Internal(other.to_string())
            }
        }
    }
}
