mod config;
pub use config::LoggerConfig;

mod error;
pub use error::{LoggerError, LoggerResult};

mod format;
pub use format::LoggerFormat;

mod level;
pub use level::LoggerLevel;

mod timer;
pub use timer::Rfc3339Timer;

mod zone;
pub use zone::LoggerTimeZone;

mod init;
pub use init::init_logger;
