use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Retention and alerting for the in-process metrics recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Most recent samples kept per operation type.
    pub history_limit: usize,
    /// Samples older than this are dropped by the sweep.
    pub ttl_secs: u64,
    /// A sample slower than this raises a performance alert.
    pub slow_threshold_secs: f64,
    pub alerts_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history_limit: 1_000,
            ttl_secs: 86_400,
            slow_threshold_secs: 30.0,
            alerts_enabled: true,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if self.history_limit == 0 {
            return Err(ModelError::InvalidConfig {
                key: "metrics.historyLimit",
                reason: "must be at least 1".into(),
            });
        }
        if !self.slow_threshold_secs.is_finite() || self.slow_threshold_secs < 0.0 {
            return Err(ModelError::InvalidConfig {
                key: "metrics.slowThresholdSecs",
                reason: format!("must be a finite non-negative value, got {}", self.slow_threshold_secs),
            });
        }
        Ok(())
    }
}
