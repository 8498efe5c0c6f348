//! Engine configuration.
//!
//! Every section is optional in the JSON document and falls back to its defaults,
//! so an empty object is a valid configuration.
mod metrics;
pub use metrics::MetricsConfig;

mod paths;
pub use paths::PathsConfig;

mod pool;
pub use pool::{PoolConfig, ProcessLimits};

use std::{path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ModelError, ModelResult},
    strategy::RetryStrategy,
};

/// Top-level configuration consumed by the build engine.
///
/// # Examples
/// ```
/// use kiln_model::EngineConfig;
///
/// let cfg = EngineConfig::from_json_str(r#"{"pool": {"capacity": 5}}"#).unwrap();
/// assert_eq!(cfg.pool.capacity, 5);
/// assert_eq!(cfg.retry.max_attempts, 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub pool: PoolConfig,
    pub retry: RetryStrategy,
    pub metrics: MetricsConfig,
    pub paths: PathsConfig,
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> ModelResult<Self> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Override selected fields from `KILN_*` variables.
    ///
    /// `lookup` abstracts the environment so callers can pass `std::env::var(..).ok()`
    /// or a fixed map in tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ModelResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("KILN_POOL_CAPACITY") {
            self.pool.capacity = parse_var("pool.capacity", &v)?;
        }
        if let Some(v) = lookup("KILN_COMMAND_TIMEOUT_MS") {
            self.pool.timeout_ms = parse_var("pool.timeoutMs", &v)?;
        }
        if let Some(v) = lookup("KILN_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_var("retry.maxAttempts", &v)?;
        }
        if let Some(v) = lookup("KILN_RETRY_FIRST_MS") {
            self.retry.first_ms = parse_var("retry.firstMs", &v)?;
        }
        if let Some(v) = lookup("KILN_COMPILER") {
            self.paths.compiler = v;
        }
        if let Some(v) = lookup("KILN_SESSIONS_DIR") {
            self.paths.sessions_dir = v.into();
        }
        if let Some(v) = lookup("KILN_EXPORTS_DIR") {
            self.paths.exports_dir = v.into();
        }
        self.validate()
    }

    pub fn validate(&self) -> ModelResult<()> {
        self.pool.validate()?;
        self.retry.validate()?;
        self.metrics.validate()?;
        if self.paths.compiler.trim().is_empty() {
            return Err(ModelError::InvalidConfig {
                key: "paths.compiler",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

fn parse_var<T>(key: &'static str, raw: &str) -> ModelResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ModelError::InvalidConfig {
        key,
        reason: format!("{raw:?}: {e}"),
    })
}
