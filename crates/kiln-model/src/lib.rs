mod domain;
pub use domain::{Env, Flag, KeyValue, Labels, SessionId, TimeoutMs};
pub use domain::{
    DEFAULT_ENTRY_FILE, OP_CLI_EXECUTION, OP_EXPORT_BUILD, OP_PERFORMANCE_ALERTS, OP_PREVIEW_BUILD,
    TAG_MINIFY, TAG_MOBILE_OPTIMIZED, TAG_OPERATION_TYPE, TAG_SESSION_ID, TAG_THRESHOLD,
};

mod error;
pub use error::{ModelError, ModelResult};

mod command;
pub use command::CommandSpec;

mod options;
pub use options::{BuildTarget, ExportOptions};

mod outcome;
pub use outcome::{BuildResult, CommandOutput, ErrorClass, OperationStats, PoolStats, WorkerId};

mod strategy;
pub use strategy::{RetryStrategy, UNKNOWN_ATTEMPT_CAP};

mod config;
pub use config::{EngineConfig, MetricsConfig, PathsConfig, PoolConfig, ProcessLimits};
