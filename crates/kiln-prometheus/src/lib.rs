//! Prometheus export for kiln engine activity.
//!
//! [`PrometheusMetrics`] implements [`kiln_core::metrics::MetricsBackend`]; inject it through
//! [`kiln_core::EngineContext::with_metrics`] and serve [`PrometheusMetrics::encode_text`]
//! from whatever HTTP surface the host process already has.
//!
//! ```rust
//! use std::sync::Arc;
//! use kiln_core::EngineContext;
//! use kiln_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let ctx = EngineContext::default().with_metrics(Arc::new(metrics.clone()));
//! # let _ = ctx;
//! let body = metrics.encode_text()?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `kiln_commands_started_total{operation}`
//! - `kiln_commands_completed_total{operation, outcome}`
//! - `kiln_command_duration_seconds{operation}`
//! - `kiln_pool_events_total{event}`
//! - `kiln_builds_total{operation, outcome}`
//! - `kiln_build_duration_seconds{operation}`

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
