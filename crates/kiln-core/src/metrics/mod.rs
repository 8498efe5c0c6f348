//! Metrics export abstraction.
//!
//! Backends (prometheus, statsd, ...) implement [`MetricsBackend`] and are injected via [`crate::EngineContext`].
//! The rolling in-process history lives in [`crate::recorder`] instead.
mod backend;
pub use backend::{MetricsBackend, MetricsHandle, Outcome, PoolEvent};

mod noop;
pub use noop::NoOpMetrics;

use std::sync::Arc;

#[inline]
pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
