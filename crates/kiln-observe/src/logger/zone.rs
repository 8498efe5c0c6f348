use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::UtcOffset;

use crate::logger::{LoggerError, LoggerResult};

/// Offset used for log timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerTimeZone {
    #[default]
    Utc,
    /// The host's offset, read once when the logger is installed.
    Local,
}

impl LoggerTimeZone {
    /// Resolve to a concrete offset.
    ///
    /// Reading the local offset can fail on multi-threaded Unix processes; callers decide
    /// whether to fall back to UTC.
    pub fn resolve(self) -> LoggerResult<UtcOffset> {
        match self {
            LoggerTimeZone::Utc => Ok(UtcOffset::UTC),
            LoggerTimeZone::Local => {
                UtcOffset::current_local_offset().map_err(|_| LoggerError::LocalOffsetUnavailable)
            }
        }
    }
}

impl FromStr for LoggerTimeZone {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utc" | "z" => Ok(Self::Utc),
            "local" => Ok(Self::Local),
            _ => Err(LoggerError::InvalidTimeZone(s.to_string())),
        }
    }
}

impl fmt::Display for LoggerTimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoggerTimeZone::Utc => "utc",
            LoggerTimeZone::Local => "local",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("UTC".parse::<LoggerTimeZone>().unwrap(), LoggerTimeZone::Utc);
        assert_eq!("Local".parse::<LoggerTimeZone>().unwrap(), LoggerTimeZone::Local);
        assert!(matches!(
            "pst".parse::<LoggerTimeZone>(),
            Err(LoggerError::InvalidTimeZone(_))
        ));
    }

    #[test]
    fn utc_always_resolves() {
        assert_eq!(LoggerTimeZone::Utc.resolve().unwrap(), UtcOffset::UTC);
    }

    #[test]
    fn local_resolves_to_a_sane_offset_or_reports_failure() {
        match LoggerTimeZone::Local.resolve() {
            Ok(offset) => assert!(offset.whole_hours().abs() <= 14),
            Err(e) => assert!(matches!(e, LoggerError::LocalOffsetUnavailable)),
        }
    }
}
