//! Build failure taxonomy.
//!
//! [`BuildError`] carries the full diagnostic payload of a failure.
//! [`classify`] maps it onto the closed [`ErrorClass`] that drives retry decisions.
mod classify;
pub use classify::classify;

mod report;
pub use report::{ErrorReport, fallback_suggestions};

mod tracker;
pub use tracker::ErrorTracker;

use std::{fmt, path::PathBuf};

use thiserror::Error;

use kiln_model::{ErrorClass, ExportOptions};

/// How a compiler invocation went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliFailureKind {
    /// The process ran and exited non-zero (or was killed by a signal).
    Exited,
    /// The per-command timeout elapsed and the process was killed.
    TimedOut,
    /// The process could not be started at all.
    SpawnFailed,
    /// The pool refused the command because it is shut down or was cleared mid-run.
    PoolClosed,
}

/// External command failure with everything needed to diagnose it.
#[derive(Debug, Clone)]
pub struct CliFailure {
    pub kind: CliFailureKind,
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Exit code conventionally used by shells for "command not found".
const EXIT_NOT_FOUND: i32 = 127;
/// Exit code conventionally used by `timeout(1)`.
const EXIT_TIMEOUT: i32 = 124;

impl CliFailure {
    pub fn exited(
        command: impl Into<String>,
        exit_code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            kind: CliFailureKind::Exited,
            command: command.into(),
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn timed_out(command: impl Into<String>, timeout_ms: u64, stdout: impl Into<String>) -> Self {
        Self {
            kind: CliFailureKind::TimedOut,
            command: command.into(),
            exit_code: None,
            stdout: stdout.into(),
            stderr: format!("command timed out after {timeout_ms}ms"),
        }
    }

    pub fn spawn_failed(command: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            kind: CliFailureKind::SpawnFailed,
            command: command.into(),
            exit_code: None,
            stdout: String::new(),
            stderr: reason.to_string(),
        }
    }

    pub fn pool_closed(command: impl Into<String>) -> Self {
        Self {
            kind: CliFailureKind::PoolClosed,
            command: command.into(),
            exit_code: None,
            stdout: String::new(),
            stderr: "worker pool is shut down".into(),
        }
    }

    fn stderr_mentions(&self, needle: &str) -> bool {
        self.stderr.to_ascii_lowercase().contains(needle)
    }

    pub fn is_not_found(&self) -> bool {
        self.exit_code == Some(EXIT_NOT_FOUND) || self.stderr_mentions("command not found")
    }

    pub fn is_permission_denied(&self) -> bool {
        self.stderr_mentions("permission denied")
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == CliFailureKind::TimedOut || self.exit_code == Some(EXIT_TIMEOUT)
    }

    /// Whether running the same command again could plausibly succeed.
    ///
    /// A missing or non-executable compiler will not fix itself; everything else
    /// (timeouts, busy resources, crashes) is treated as transient.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            CliFailureKind::SpawnFailed | CliFailureKind::PoolClosed => false,
            CliFailureKind::TimedOut => true,
            CliFailureKind::Exited => {
                if self.is_timeout() {
                    return true;
                }
                !(self.is_not_found() || self.is_permission_denied())
            }
        }
    }

    /// Non-empty stderr and stdout lines, stderr first.
    pub fn log_lines(&self) -> Vec<String> {
        self.stderr
            .lines()
            .chain(self.stdout.lines())
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

impl fmt::Display for CliFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CliFailureKind::Exited => match self.exit_code {
                Some(code) => write!(f, "command `{}` exited with code {code}", self.command)?,
                None => write!(f, "command `{}` was terminated by a signal", self.command)?,
            },
            CliFailureKind::TimedOut => write!(f, "command `{}` timed out", self.command)?,
            CliFailureKind::SpawnFailed => write!(f, "command `{}` could not be started", self.command)?,
            CliFailureKind::PoolClosed => write!(f, "command `{}` rejected", self.command)?,
        }
        let detail = self.stderr.trim();
        if !detail.is_empty() {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CliFailure {}

/// Category of a single description validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidationKind {
    Structure,
    Required,
    Type,
    Constraint,
    Other,
}

impl ValidationKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            ValidationKind::Structure => "structure",
            ValidationKind::Required => "required",
            ValidationKind::Type => "type",
            ValidationKind::Constraint => "constraint",
            ValidationKind::Other => "other",
        }
    }
}

/// One problem reported by the upstream description validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub kind: ValidationKind,
    /// Dotted path, e.g. `properties.name` or `objects.0.name`.
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(kind: ValidationKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            message: message.into(),
        }
    }

    /// A required field directly under the document root or its `properties` block.
    fn is_missing_root_field(&self) -> bool {
        self.kind == ValidationKind::Required
            && (!self.field.contains('.') || self.field.starts_with("properties."))
    }
}

/// Every way a build can fail.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Cli(#[from] CliFailure),

    #[error("description validation failed with {} issue(s)", .issues.len())]
    Validation { issues: Vec<ValidationIssue> },

    #[error("preview build failed for {path:?}: {message}")]
    Preview {
        message: String,
        path: PathBuf,
        logs: Vec<String>,
        retryable: bool,
        #[source]
        source: Option<Box<BuildError>>,
    },

    #[error("export build failed for {path:?}: {message}")]
    Export {
        message: String,
        path: PathBuf,
        options: ExportOptions,
        logs: Vec<String>,
        retryable: bool,
        #[source]
        source: Option<Box<BuildError>>,
    },

    #[error("io error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] kiln_model::ModelError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, BuildError>;

impl BuildError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BuildError::Io {
            context: context.into(),
            source,
        }
    }

    /// A validation failure is recoverable unless the document is structurally broken
    /// or misses a required root property.
    pub fn validation_recoverable(issues: &[ValidationIssue]) -> bool {
        !issues
            .iter()
            .any(|i| i.kind == ValidationKind::Structure || i.is_missing_root_field())
    }

    /// Most severe validation issue, if this is a validation failure.
    pub fn critical_issue(&self) -> Option<&ValidationIssue> {
        match self {
            BuildError::Validation { issues } => issues.iter().min_by_key(|i| i.kind),
            _ => None,
        }
    }

    /// Shorthand for `classify(self)`.
    pub fn class(&self) -> ErrorClass {
        classify(self)
    }
}
