use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Unclassified failures get at most one retry, whatever the configuration says.
pub const UNKNOWN_ATTEMPT_CAP: u32 = 2;

/// Retry and backoff constants for build operations.
///
/// The delay before retry `n` (1-based) is `first_ms * factor^(n-1)`,
/// so the defaults produce 2s, 4s, 8s...
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryStrategy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub first_ms: u64,
    /// Growth factor applied to the delay after every retry.
    pub factor: f64,
    /// Attempt cap for failures that could not be classified; at most
    /// [`UNKNOWN_ATTEMPT_CAP`].
    pub unknown_max_attempts: u32,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            first_ms: 2_000,
            factor: 2.0,
            unknown_max_attempts: 2,
        }
    }
}

impl RetryStrategy {
    pub fn validate(&self) -> ModelResult<()> {
        if self.max_attempts == 0 {
            return Err(ModelError::InvalidConfig {
                key: "retry.maxAttempts",
                reason: "must be at least 1".into(),
            });
        }
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(ModelError::InvalidConfig {
                key: "retry.factor",
                reason: format!("must be a finite value >= 1, got {}", self.factor),
            });
        }
        if !(1..=UNKNOWN_ATTEMPT_CAP).contains(&self.unknown_max_attempts) {
            return Err(ModelError::InvalidConfig {
                key: "retry.unknownMaxAttempts",
                reason: format!(
                    "must be between 1 and {UNKNOWN_ATTEMPT_CAP}, got {}",
                    self.unknown_max_attempts
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let s = RetryStrategy::default();
        assert_eq!(s.max_attempts, 3);
        assert_eq!(s.first_ms, 2_000);
        assert_eq!(s.factor, 2.0);
        assert_eq!(s.unknown_max_attempts, 2);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn validate_rejects_shrinking_factor() {
        let s = RetryStrategy {
            factor: 0.5,
            ..Default::default()
        };
        assert!(matches!(
            s.validate(),
            Err(ModelError::InvalidConfig { key: "retry.factor", .. })
        ));
    }

    #[test]
    fn validate_rejects_more_than_one_unknown_retry() {
        for n in [0, 3] {
            let s = RetryStrategy {
                unknown_max_attempts: n,
                ..Default::default()
            };
            assert!(matches!(
                s.validate(),
                Err(ModelError::InvalidConfig { key: "retry.unknownMaxAttempts", .. })
            ));
        }
        let once = RetryStrategy {
            unknown_max_attempts: 1,
            ..Default::default()
        };
        assert!(once.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s: RetryStrategy = serde_json::from_str(r#"{"firstMs": 10}"#).unwrap();
        assert_eq!(s.first_ms, 10);
        assert_eq!(s.max_attempts, 3);
    }
}
