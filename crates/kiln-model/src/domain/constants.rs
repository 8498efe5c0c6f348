//! Well-known operation types and metric tag keys.
//!
//! Operation types group metric samples and give retry loops a name in logs.

/// Top-level preview build request.
pub const OP_PREVIEW_BUILD: &str = "preview_build";

/// Top-level export build request.
pub const OP_EXPORT_BUILD: &str = "export_build";

/// A single compiler invocation executed by the worker pool.
pub const OP_CLI_EXECUTION: &str = "cli_execution";

/// Slow-operation alerts raised by the metrics recorder.
pub const OP_PERFORMANCE_ALERTS: &str = "performance_alerts";

/// Entry file the compiler must produce for a build to count as successful.
pub const DEFAULT_ENTRY_FILE: &str = "index.html";

pub const TAG_SESSION_ID: &str = "session_id";
pub const TAG_MINIFY: &str = "minify";
pub const TAG_MOBILE_OPTIMIZED: &str = "mobile_optimized";
pub const TAG_OPERATION_TYPE: &str = "operation_type";
pub const TAG_THRESHOLD: &str = "threshold";
