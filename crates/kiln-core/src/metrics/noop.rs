use crate::metrics::backend::{MetricsBackend, Outcome, PoolEvent};

/// Backend that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_command_started(&self, _: &str) {}

    #[inline(always)]
    fn record_command_completed(&self, _: &str, _: Outcome, _: u64) {}

    #[inline(always)]
    fn record_pool_event(&self, _: PoolEvent) {}

    #[inline(always)]
    fn record_build(&self, _: &str, _: Outcome, _: u64) {}
}
