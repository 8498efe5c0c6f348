use std::path::Path;

use serde::Serialize;

use kiln_model::{OperationStats, PoolStats};

/// Error rate above which the engine reports itself degraded.
const DEGRADED_ERROR_RATE: f64 = 50.0;

/// Aggregated view of recent engine activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub preview_build: OperationStats,
    pub export_build: OperationStats,
    pub cli_execution: OperationStats,
    pub performance_alerts: OperationStats,
    pub preview_throughput_per_minute: f64,
    /// Mean preview duration over the last hour, in seconds.
    pub average_preview_seconds: f64,
    pub pool: PoolStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
}

/// Liveness summary suitable for a health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: HealthState,
    pub compiler_available: bool,
    pub pool: PoolStats,
    /// Failed builds over the last hour, as a percentage.
    pub recent_error_rate: f64,
}

impl HealthStatus {
    pub fn new(compiler_available: bool, pool: PoolStats, recent_error_rate: f64) -> Self {
        let status = if compiler_available && recent_error_rate < DEGRADED_ERROR_RATE {
            HealthState::Healthy
        } else {
            HealthState::Degraded
        };
        Self {
            status,
            compiler_available,
            pool,
            recent_error_rate,
        }
    }
}

/// Whether `program` names an existing file or resolves through `PATH`.
pub fn compiler_available(program: &str) -> bool {
    if program.is_empty() {
        return false;
    }
    let direct = Path::new(program);
    if direct.components().count() > 1 || direct.is_absolute() {
        return direct.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_programs_on_path_and_by_location() {
        assert!(compiler_available("sh"));
        assert!(!compiler_available("kiln-no-such-compiler-7f3a"));
        assert!(!compiler_available(""));

        let tmp = tempfile::tempdir().unwrap();
        let bin = tmp.path().join("gdexport");
        assert!(!compiler_available(bin.to_str().unwrap()));
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();
        assert!(compiler_available(bin.to_str().unwrap()));
    }

    #[test]
    fn degraded_when_compiler_missing_or_failing() {
        let pool = PoolStats::default();
        assert_eq!(HealthStatus::new(true, pool, 10.0).status, HealthState::Healthy);
        assert_eq!(HealthStatus::new(false, pool, 0.0).status, HealthState::Degraded);
        assert_eq!(HealthStatus::new(true, pool, 75.0).status, HealthState::Degraded);
    }

    #[test]
    fn health_serializes_in_camel_case() {
        let v = serde_json::to_value(HealthStatus::new(true, PoolStats::default(), 0.0)).unwrap();
        assert_eq!(v["status"], "healthy");
        assert_eq!(v["compilerAvailable"], true);
        assert_eq!(v["pool"]["temporarySpawned"], 0);
    }
}
