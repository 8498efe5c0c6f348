//! Logging setup for kiln binaries.
//!
//! Libraries only emit through `tracing`; the process that owns `main` calls [`init_logger`] once.
mod logger;
pub use logger::{
    LoggerConfig, LoggerError, LoggerFormat, LoggerLevel, LoggerResult, LoggerTimeZone, Rfc3339Timer,
    init_logger,
};
