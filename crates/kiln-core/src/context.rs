use std::{fmt, sync::Arc};

use kiln_model::Env;

use crate::{metrics::MetricsHandle, recorder::MetricsRecorder};

/// Shared dependencies handed to the pool and the pipeline.
#[derive(Clone)]
pub struct EngineContext {
    env: Env,
    metrics: MetricsHandle,
    recorder: Arc<MetricsRecorder>,
}

impl EngineContext {
    pub fn new(env: Env, metrics: MetricsHandle, recorder: Arc<MetricsRecorder>) -> Self {
        Self {
            env,
            metrics,
            recorder,
        }
    }

    /// Environment added to every compiler invocation.
    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }

    pub fn recorder(&self) -> &Arc<MetricsRecorder> {
        &self.recorder
    }

    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<MetricsRecorder>) -> Self {
        self.recorder = recorder;
        self
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self {
            env: Env::default(),
            metrics: crate::metrics::noop_metrics(),
            recorder: Arc::new(MetricsRecorder::default()),
        }
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("env_len", &self.env.len())
            .field("metrics", &"<handle>")
            .field("recorder_types", &self.recorder.operation_types().len())
            .finish()
    }
}

impl fmt::Display for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineContext(env_len={})", self.env.len())
    }
}
