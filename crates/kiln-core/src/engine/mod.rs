//! Caller-facing build facade.
//!
//! [`BuildEngine`] wraps the pipeline with timing, metric recording and failure
//! reporting, and turns every outcome into a [`BuildResult`].
mod report;
pub use report::{HealthState, HealthStatus, PerformanceReport, compiler_available};

use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{error, info, instrument};

use kiln_model::{
    BuildResult, EngineConfig, ExportOptions, Labels, OP_CLI_EXECUTION, OP_EXPORT_BUILD,
    OP_PERFORMANCE_ALERTS, OP_PREVIEW_BUILD, OperationStats, PoolStats, TAG_MINIFY,
    TAG_MOBILE_OPTIMIZED, TAG_SESSION_ID,
};

use crate::{
    context::EngineContext,
    error::{BuildError, CoreResult, ErrorTracker},
    executor::{CommandExecutor, Packager},
    metrics::Outcome,
    pipeline::{BuildArtifacts, BuildPipeline},
    recorder::MetricSample,
};

const HOUR: Duration = Duration::from_secs(3_600);

/// Entry point for preview and export builds.
pub struct BuildEngine {
    cfg: EngineConfig,
    pipeline: BuildPipeline,
    ctx: EngineContext,
    tracker: ErrorTracker,
}

impl BuildEngine {
    /// Validate `cfg` and assemble an engine around the given collaborators.
    pub fn new(
        cfg: EngineConfig,
        executor: Arc<dyn CommandExecutor>,
        packager: Arc<dyn Packager>,
        ctx: EngineContext,
    ) -> CoreResult<Self> {
        cfg.validate()?;
        let pipeline = BuildPipeline::new(&cfg, executor, packager).with_env(ctx.env().clone());
        info!(
            executor = pipeline.executor().name(),
            capacity = cfg.pool.capacity,
            compiler = %cfg.paths.compiler,
            "build engine ready"
        );
        Ok(Self {
            cfg,
            pipeline,
            ctx,
            tracker: ErrorTracker::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn error_tracker(&self) -> &ErrorTracker {
        &self.tracker
    }

    /// Build the browser preview for `session_id`.
    ///
    /// Never fails: errors are reported through [`BuildResult::error`].
    #[instrument(level = "info", skip(self, description), fields(session_id = %session_id))]
    pub async fn build_preview(&self, session_id: &str, description: &Path) -> BuildResult {
        let started = Instant::now();
        let res = self.pipeline.preview(session_id, description).await;
        let elapsed = started.elapsed();

        let tags = Labels::new().with(TAG_SESSION_ID, session_id);
        self.observe(OP_PREVIEW_BUILD, &res, elapsed, tags);

        match res {
            Ok(artifacts) => {
                let result = BuildResult {
                    preview_url: Some(self.cfg.paths.preview_url(session_id)),
                    ..self.success(session_id, artifacts, elapsed)
                };
                info!(duration_ms = result.build_duration_ms, "preview build completed");
                result
            }
            Err(err) => self.failure(session_id, err, elapsed),
        }
    }

    /// Build and package the downloadable export for `session_id`.
    #[instrument(
        level = "info",
        skip(self, description, options),
        fields(session_id = %session_id, minify = %options.minify, mobile = %options.mobile_optimized)
    )]
    pub async fn build_export(
        &self,
        session_id: &str,
        description: &Path,
        options: ExportOptions,
    ) -> BuildResult {
        let started = Instant::now();
        let res = self.pipeline.export(session_id, description, &options).await;
        let elapsed = started.elapsed();

        let tags = Labels::new()
            .with(TAG_SESSION_ID, session_id)
            .with(TAG_MINIFY, options.minify.is_enabled())
            .with(TAG_MOBILE_OPTIMIZED, options.mobile_optimized.is_enabled());
        self.observe(OP_EXPORT_BUILD, &res, elapsed, tags);

        match res {
            Ok(artifacts) => {
                let package = artifacts.package.clone();
                let result = BuildResult {
                    package_size_bytes: package.as_ref().map(|p| p.size_bytes),
                    package_path: package.map(|p| p.path),
                    download_url: Some(self.cfg.paths.download_url(session_id)),
                    ..self.success(session_id, artifacts, elapsed)
                };
                info!(
                    duration_ms = result.build_duration_ms,
                    size_bytes = result.package_size_bytes,
                    "export build completed"
                );
                result
            }
            Err(err) => self.failure(session_id, err, elapsed),
        }
    }

    fn observe(&self, operation_type: &str, res: &CoreResult<BuildArtifacts>, elapsed: Duration, tags: Labels) {
        let outcome = match res {
            Ok(_) => Outcome::Success,
            Err(err) if is_timeout(err) => Outcome::Timeout,
            Err(_) => Outcome::Failure,
        };
        self.ctx.recorder().record(
            MetricSample::new(operation_type, elapsed.as_secs_f64(), res.is_ok()).with_tags(tags),
        );
        self.ctx
            .metrics()
            .record_build(operation_type, outcome, elapsed.as_millis() as u64);
    }

    fn success(&self, session_id: &str, artifacts: BuildArtifacts, elapsed: Duration) -> BuildResult {
        self.tracker.reset(session_id);
        BuildResult {
            success: true,
            session_id: session_id.to_string(),
            artifact_path: Some(artifacts.output_dir),
            build_duration_seconds: elapsed.as_secs(),
            build_duration_ms: elapsed.as_millis() as u64,
            ..BuildResult::default()
        }
    }

    fn failure(&self, session_id: &str, err: BuildError, elapsed: Duration) -> BuildResult {
        let kind = err.kind_label();
        let failures = self.tracker.record(session_id, kind);
        let class = err.class();
        error!(error_type = kind, failures, class = class.as_label(), error = %err, "build failed");

        let mut suggestions = vec![err.suggested_action()];
        suggestions.extend(self.tracker.suggestions(session_id, kind));

        BuildResult {
            success: false,
            session_id: session_id.to_string(),
            error: Some(err.user_message()),
            error_class: Some(class),
            suggestions,
            build_duration_seconds: elapsed.as_secs(),
            build_duration_ms: elapsed.as_millis() as u64,
            ..BuildResult::default()
        }
    }

    pub fn pool_statistics(&self) -> PoolStats {
        self.pipeline.executor().stats()
    }

    pub fn operation_statistics(&self, operation_type: &str) -> OperationStats {
        self.ctx.recorder().statistics(operation_type)
    }

    pub fn performance_report(&self) -> PerformanceReport {
        let recorder = self.ctx.recorder();
        PerformanceReport {
            preview_build: recorder.statistics(OP_PREVIEW_BUILD),
            export_build: recorder.statistics(OP_EXPORT_BUILD),
            cli_execution: recorder.statistics(OP_CLI_EXECUTION),
            performance_alerts: recorder.statistics(OP_PERFORMANCE_ALERTS),
            preview_throughput_per_minute: recorder.throughput_per_minute(OP_PREVIEW_BUILD),
            average_preview_seconds: recorder.average_processing_time(OP_PREVIEW_BUILD, HOUR),
            pool: self.pool_statistics(),
        }
    }

    /// Drop recorded samples older than the configured TTL; returns how many were removed.
    pub fn sweep_metrics(&self) -> usize {
        self.ctx.recorder().sweep_expired()
    }

    pub fn health(&self) -> HealthStatus {
        let error_rate = self
            .ctx
            .recorder()
            .recent_error_rate(&[OP_PREVIEW_BUILD, OP_EXPORT_BUILD], HOUR);
        HealthStatus::new(
            compiler_available(&self.cfg.paths.compiler),
            self.pool_statistics(),
            error_rate,
        )
    }

    /// Stop accepting builds and drain the executor within `grace`.
    pub async fn shutdown(&self, grace: Duration) {
        info!(grace_ms = grace.as_millis() as u64, "draining build engine");
        self.pipeline.executor().shutdown(grace).await;
    }
}

fn is_timeout(err: &BuildError) -> bool {
    match err {
        BuildError::Cli(failure) => failure.is_timeout(),
        BuildError::Preview { source: Some(inner), .. } | BuildError::Export { source: Some(inner), .. } => {
            is_timeout(inner)
        }
        _ => false,
    }
}
