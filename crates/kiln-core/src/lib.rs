//! Build orchestration: failure taxonomy, retry control, the preview/export
//! pipeline and the in-process metric history.
//!
//! Process execution and packaging stay behind the [`CommandExecutor`] and
//! [`Packager`] seams; `kiln-exec` provides the subprocess implementations.
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod pipeline;
pub mod recorder;
pub mod retry;

pub use context::EngineContext;
pub use engine::BuildEngine;
pub use error::{BuildError, CoreResult};
pub use executor::{CommandExecutor, PackageArtifact, Packager};

pub mod prelude {
    pub use crate::context::EngineContext;
    pub use crate::engine::{BuildEngine, HealthStatus, PerformanceReport};
    pub use crate::error::{BuildError, CliFailure, CoreResult, ErrorReport, classify};
    pub use crate::executor::{CommandExecutor, PackageArtifact, Packager};
    pub use crate::metrics::{MetricsBackend, MetricsHandle, Outcome, PoolEvent};
    pub use crate::recorder::{MetricSample, MetricsRecorder};
    pub use crate::retry::{RetryDecision, RetryPolicy};
}
