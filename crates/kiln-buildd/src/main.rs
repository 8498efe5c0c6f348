mod cli;

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use kiln_core::{
    BuildEngine, EngineContext,
    engine::{HealthStatus, PerformanceReport},
    recorder::MetricsRecorder,
};
use kiln_exec::{TarPackager, WorkerPool};
use kiln_model::{BuildResult, EngineConfig};
use kiln_observe::{LoggerConfig, init_logger};
use kiln_prometheus::PrometheusMetrics;

use crate::cli::Cli;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary<'a> {
    result: &'a BuildResult,
    performance: PerformanceReport,
    health: HealthStatus,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1) logger
    let mut log_cfg = LoggerConfig::default();
    log_cfg.apply_env_overrides(env_var)?;
    if let Some(level) = cli.log_level.clone() {
        log_cfg.level = level;
    }
    if let Some(format) = cli.log_format {
        log_cfg.format = format;
    }
    init_logger(&log_cfg)?;

    // 2) config
    let mut cfg = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    cfg.apply_env_overrides(env_var)
        .context("applying KILN_* overrides")?;

    // 3) metrics + engine
    let metrics = PrometheusMetrics::new()?;
    let ctx = EngineContext::default()
        .with_metrics(Arc::new(metrics.clone()))
        .with_recorder(Arc::new(MetricsRecorder::new(cfg.metrics.clone())));
    let pool = WorkerPool::new(cfg.pool.clone(), ctx.clone())?;
    let engine = BuildEngine::new(cfg, Arc::new(pool), Arc::new(TarPackager::new()), ctx)?;
    info!(session_id = %cli.session, export = cli.export, "engine ready");

    // 4) one build, interruptible
    let build = async {
        if cli.export {
            engine
                .build_export(&cli.session, &cli.description, cli.export_options())
                .await
        } else {
            engine.build_preview(&cli.session, &cli.description).await
        }
    };
    tokio::pin!(build);
    let result = tokio::select! {
        res = &mut build => res,
        _ = tokio::signal::ctrl_c() => {
            warn!(grace_secs = cli.grace, "interrupted, draining worker pool");
            // The build must keep being polled or its command never leaves the busy set.
            let ((), res) = tokio::join!(engine.shutdown(cli.grace()), &mut build);
            res
        }
    };

    // 5) report
    let summary = Summary {
        result: &result,
        performance: engine.performance_report(),
        health: engine.health(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(path) = &cli.metrics_out {
        std::fs::write(path, metrics.encode_text()?)
            .with_context(|| format!("writing metrics to {}", path.display()))?;
    }

    engine.shutdown(cli.grace()).await;

    if !result.success {
        bail!(
            "build failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
