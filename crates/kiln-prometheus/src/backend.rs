use std::sync::Arc;

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};

use kiln_core::metrics::{MetricsBackend, Outcome, PoolEvent};

const NAMESPACE: &str = "kiln";

const COMMAND_BUCKETS: &[f64] = &[0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];
const BUILD_BUCKETS: &[f64] = &[0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

/// Prometheus backend for engine metrics.
///
/// Every label is bounded: `operation` is one of the engine operation types,
/// `outcome` is `success|failure|timeout`, `event` is a pool transition name.
#[derive(Clone)]
pub struct PrometheusMetrics {
    commands_started: CounterVec,
    commands_completed: CounterVec,
    command_duration: HistogramVec,
    pool_events: CounterVec,
    builds: CounterVec,
    build_duration: HistogramVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    /// Register kiln metrics on an existing registry.
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let commands_started = counter(
            &registry,
            "commands_started_total",
            "Compiler commands handed to a worker",
            &["operation"],
        )?;
        let commands_completed = counter(
            &registry,
            "commands_completed_total",
            "Compiler commands that finished",
            &["operation", "outcome"],
        )?;
        let command_duration = histogram(
            &registry,
            "command_duration_seconds",
            "Wall-clock time of a single compiler command",
            COMMAND_BUCKETS,
        )?;
        let pool_events =
            counter(&registry, "pool_events_total", "Worker pool transitions", &["event"])?;
        let builds = counter(
            &registry,
            "builds_total",
            "Build requests that finished, retries included",
            &["operation", "outcome"],
        )?;
        let build_duration = histogram(
            &registry,
            "build_duration_seconds",
            "End-to-end build request time",
            BUILD_BUCKETS,
        )?;

        Ok(Self {
            commands_started,
            commands_completed,
            command_duration,
            pool_events,
            builds,
            build_duration,
            registry,
        })
    }

    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render all families in the text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

fn counter(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<CounterVec, prometheus::Error> {
    let vec = CounterVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

fn histogram(
    registry: &Registry,
    name: &str,
    help: &str,
    buckets: &[f64],
) -> Result<HistogramVec, prometheus::Error> {
    let vec = HistogramVec::new(
        HistogramOpts::new(name, help)
            .namespace(NAMESPACE)
            .buckets(buckets.to_vec()),
        &["operation"],
    )?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

#[inline]
fn seconds(duration_ms: u64) -> f64 {
    duration_ms as f64 / 1000.0
}

impl MetricsBackend for PrometheusMetrics {
    fn record_command_started(&self, operation: &str) {
        self.commands_started.with_label_values(&[operation]).inc();
    }

    fn record_command_completed(&self, operation: &str, outcome: Outcome, duration_ms: u64) {
        self.commands_completed
            .with_label_values(&[operation, outcome.as_label()])
            .inc();
        self.command_duration
            .with_label_values(&[operation])
            .observe(seconds(duration_ms));
    }

    fn record_pool_event(&self, event: PoolEvent) {
        self.pool_events.with_label_values(&[event.as_label()]).inc();
    }

    fn record_build(&self, operation: &str, outcome: Outcome, duration_ms: u64) {
        self.builds
            .with_label_values(&[operation, outcome.as_label()])
            .inc();
        self.build_duration
            .with_label_values(&[operation])
            .observe(seconds(duration_ms));
    }
}
