use serde::{Deserialize, Serialize};

use crate::{
    domain::TimeoutMs,
    error::{ModelError, ModelResult},
};

/// POSIX resource limits applied to every compiler process.
///
/// `None` leaves the inherited limit untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessLimits {
    /// `RLIMIT_NOFILE`.
    pub max_open_files: Option<u64>,
    /// `RLIMIT_FSIZE`; the compiler gets `SIGXFSZ` when it writes past this.
    pub max_file_size_bytes: Option<u64>,
    /// Set `RLIMIT_CORE` to zero.
    pub disable_core_dumps: bool,
}

impl ProcessLimits {
    pub fn is_empty(&self) -> bool {
        self.max_open_files.is_none() && self.max_file_size_bytes.is_none() && !self.disable_core_dumps
    }
}

/// Sizing and timing of the worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolConfig {
    /// Maximum number of pooled workers (idle + busy).
    pub capacity: usize,
    /// Hard limit for a single command.
    pub timeout_ms: TimeoutMs,
    /// How long a caller waits for a worker before a temporary one is spawned.
    pub wait_ceiling_ms: u64,
    /// Fallback poll interval while waiting for a worker.
    pub poll_interval_ms: u64,
    pub limits: ProcessLimits,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 3,
            timeout_ms: 300_000,
            wait_ceiling_ms: 30_000,
            poll_interval_ms: 100,
            limits: ProcessLimits::default(),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if self.capacity == 0 {
            return Err(ModelError::InvalidConfig {
                key: "pool.capacity",
                reason: "must be at least 1".into(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ModelError::InvalidConfig {
                key: "pool.timeoutMs",
                reason: "must be non-zero".into(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ModelError::InvalidConfig {
                key: "pool.pollIntervalMs",
                reason: "must be non-zero".into(),
            });
        }
        if self.limits.max_file_size_bytes == Some(0) {
            return Err(ModelError::InvalidConfig {
                key: "pool.limits.maxFileSizeBytes",
                reason: "cannot be zero".into(),
            });
        }
        Ok(())
    }
}
