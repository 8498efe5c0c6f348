use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format `{0}` (expected text, json or journald)")]
    InvalidFormat(String),

    #[error("invalid log filter `{filter}`: {reason}")]
    InvalidLevel { filter: String, reason: String },

    #[error("unknown time zone `{0}` (expected utc or local)")]
    InvalidTimeZone(String),

    #[error("local UTC offset could not be determined")]
    LocalOffsetUnavailable,

    #[error("journald is unavailable: {0}")]
    Journald(String),

    #[error("a global logger is already installed")]
    AlreadyInitialized,
}

pub type LoggerResult<T> = Result<T, LoggerError>;
