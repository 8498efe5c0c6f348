use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::SessionId;

/// Opaque identifier of a pool worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(u64);

impl WorkerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{:x}", self.0)
    }
}

/// Classification of a failure, used to decide whether to retry.
///
/// Closed on purpose: retry logic matches it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ErrorClass {
    CliFailure { retryable: bool },
    ValidationFailure { recoverable: bool },
    PreviewFailure { retryable: bool },
    ExportFailure { retryable: bool },
    Unknown,
}

impl ErrorClass {
    /// Whether another attempt might succeed.
    ///
    /// `Unknown` reports `true`; the retry controller caps it separately.
    pub const fn is_retryable(&self) -> bool {
        match self {
            ErrorClass::CliFailure { retryable }
            | ErrorClass::PreviewFailure { retryable }
            | ErrorClass::ExportFailure { retryable } => *retryable,
            ErrorClass::ValidationFailure { recoverable } => *recoverable,
            ErrorClass::Unknown => true,
        }
    }

    pub const fn as_label(&self) -> &'static str {
        match self {
            ErrorClass::CliFailure { .. } => "cli_failure",
            ErrorClass::ValidationFailure { .. } => "validation_failure",
            ErrorClass::PreviewFailure { .. } => "preview_failure",
            ErrorClass::ExportFailure { .. } => "export_failure",
            ErrorClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Result of one command run by the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub success: bool,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub worker: WorkerId,
}

/// Outcome of a top-level build request, handed back to the session layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub success: bool,
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    pub build_duration_seconds: u64,
    pub build_duration_ms: u64,
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub capacity: usize,
    pub idle: usize,
    pub busy: usize,
    /// Unpooled workers created because the saturation wait ran out.
    pub temporary_spawned: u64,
    /// Workers terminated after an abnormal exit, timeout, or shutdown.
    pub evicted: u64,
}

/// Aggregates over the samples currently retained for one operation type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    pub count: usize,
    pub average_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    /// Percentage in `0.0..=100.0`.
    pub success_rate: f64,
}
