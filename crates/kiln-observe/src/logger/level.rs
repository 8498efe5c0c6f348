use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::logger::LoggerError;

/// An `EnvFilter` directive string, checked when it is constructed.
///
/// Accepts anything `EnvFilter` does: a bare level (`"debug"`) or per-target
/// directives (`"kiln_exec=trace,kiln_core=debug,info"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LoggerLevel(String);

impl LoggerLevel {
    pub fn new(filter: impl Into<String>) -> Result<Self, LoggerError> {
        let filter = filter.into();
        EnvFilter::try_new(&filter).map_err(|e| LoggerError::InvalidLevel {
            reason: e.to_string(),
            filter: filter.clone(),
        })?;
        Ok(Self(filter))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the filter layer for this directive.
    pub fn to_env_filter(&self) -> EnvFilter {
        // Checked in `new`.
        EnvFilter::try_new(&self.0).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

impl Default for LoggerLevel {
    fn default() -> Self {
        Self("info".into())
    }
}

impl FromStr for LoggerLevel {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LoggerLevel {
    type Error = LoggerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<LoggerLevel> for String {
    fn from(l: LoggerLevel) -> Self {
        l.0
    }
}

impl fmt::Display for LoggerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_levels_and_target_directives() {
        for ok in ["info", "warn", "trace", "kiln_exec=trace,kiln_core=debug,info"] {
            let lvl: LoggerLevel = ok.parse().unwrap();
            assert_eq!(lvl.as_str(), ok);
            let _ = lvl.to_env_filter();
        }
    }

    #[test]
    fn rejects_unknown_level_names() {
        for bad in ["kiln_exec=verbose", "kiln_core=debug,kiln_exec=loud"] {
            let err = bad.parse::<LoggerLevel>().unwrap_err();
            assert!(matches!(err, LoggerError::InvalidLevel { ref filter, .. } if filter == bad));
        }
    }

    #[test]
    fn default_is_info() {
        assert_eq!(LoggerLevel::default().as_str(), "info");
    }

    #[test]
    fn deserialization_validates() {
        let lvl: LoggerLevel = serde_json::from_str(r#""kiln_core=debug""#).unwrap();
        assert_eq!(lvl.to_string(), "kiln_core=debug");
        assert!(serde_json::from_str::<LoggerLevel>(r#""kiln_core=chatty""#).is_err());
    }
}
