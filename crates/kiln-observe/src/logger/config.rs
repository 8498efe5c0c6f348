use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::logger::{LoggerFormat, LoggerLevel, LoggerResult, LoggerTimeZone};

/// Logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directives, e.g. `"kiln_exec=debug,info"`.
    pub level: LoggerLevel,
    pub tz: LoggerTimeZone,
    /// Print the emitting module next to each line.
    pub with_targets: bool,
    /// ANSI colors for the text format; ignored when stdout is not a terminal.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            tz: LoggerTimeZone::default(),
            with_targets: true,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    /// Apply `KILN_LOG_LEVEL`, `KILN_LOG_FORMAT` and `KILN_LOG_TZ` from `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> LoggerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("KILN_LOG_LEVEL") {
            self.level = level.parse()?;
        }
        if let Some(format) = lookup("KILN_LOG_FORMAT") {
            self.format = format.parse()?;
        }
        if let Some(tz) = lookup("KILN_LOG_TZ") {
            self.tz = tz.parse()?;
        }
        Ok(())
    }

    pub(crate) fn ansi(&self) -> bool {
        self.use_color && std::io::stdout().is_terminal()
    }
}
