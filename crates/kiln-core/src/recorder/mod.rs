//! Rolling per-operation history with aggregate statistics.
//!
//! Every operation type gets its own ring buffer, bounded both by length
//! (`history_limit`) and by age (`ttl_secs`, enforced by [`MetricsRecorder::sweep_expired`]).
//! None of the methods fail: a poisoned lock is recovered and non-finite durations are dropped.
mod sample;
pub use sample::MetricSample;

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use time::OffsetDateTime;
use tracing::{trace, warn};

use kiln_model::{
    Labels, MetricsConfig, OP_PERFORMANCE_ALERTS, OperationStats, TAG_OPERATION_TYPE,
    TAG_SESSION_ID, TAG_THRESHOLD,
};

const HOUR: Duration = Duration::from_secs(3_600);

type Series = HashMap<String, VecDeque<MetricSample>>;

/// Bounded, time-windowed metric history.
#[derive(Debug)]
pub struct MetricsRecorder {
    cfg: MetricsConfig,
    series: Mutex<Series>,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

impl MetricsRecorder {
    pub fn new(cfg: MetricsConfig) -> Self {
        Self {
            cfg,
            series: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.cfg
    }

    fn series(&self) -> MutexGuard<'_, Series> {
        self.series.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Append a sample to its operation type's history.
    ///
    /// Samples slower than the configured threshold also produce an alert
    /// under [`OP_PERFORMANCE_ALERTS`]; the alert is purely informational.
    pub fn record(&self, sample: MetricSample) {
        if !self.cfg.enabled {
            return;
        }
        if !sample.duration_seconds.is_finite() || sample.duration_seconds < 0.0 {
            warn!(
                operation_type = %sample.operation_type,
                duration = sample.duration_seconds,
                "dropping metric sample with invalid duration",
            );
            return;
        }

        let alert = self.slow_alert(&sample);
        let mut series = self.series();
        self.push(&mut series, sample);
        if let Some(alert) = alert {
            self.push(&mut series, alert);
        }
    }

    fn push(&self, series: &mut Series, sample: MetricSample) {
        let buf = series.entry(sample.operation_type.clone()).or_default();
        buf.push_back(sample);
        while buf.len() > self.cfg.history_limit {
            buf.pop_front();
        }
    }

    fn slow_alert(&self, sample: &MetricSample) -> Option<MetricSample> {
        if !self.cfg.alerts_enabled
            || sample.operation_type == OP_PERFORMANCE_ALERTS
            || sample.duration_seconds <= self.cfg.slow_threshold_secs
        {
            return None;
        }

        let session = sample.tags.get(TAG_SESSION_ID).unwrap_or("-");
        warn!(
            operation_type = %sample.operation_type,
            duration = sample.duration_seconds,
            threshold = self.cfg.slow_threshold_secs,
            session_id = session,
            "slow operation detected",
        );

        let tags = Labels::new()
            .with(TAG_OPERATION_TYPE, &sample.operation_type)
            .with(TAG_THRESHOLD, self.cfg.slow_threshold_secs)
            .with(TAG_SESSION_ID, session);
        Some(
            MetricSample::new(OP_PERFORMANCE_ALERTS, sample.duration_seconds, sample.success)
                .with_tags(tags)
                .at(sample.timestamp),
        )
    }

    /// Aggregates over the samples currently retained for `operation_type`.
    pub fn statistics(&self, operation_type: &str) -> OperationStats {
        let series = self.series();
        let Some(buf) = series.get(operation_type).filter(|b| !b.is_empty()) else {
            return OperationStats::default();
        };

        let count = buf.len();
        let mut total = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut ok = 0usize;
        for s in buf {
            total += s.duration_seconds;
            min = min.min(s.duration_seconds);
            max = max.max(s.duration_seconds);
            ok += usize::from(s.success);
        }

        OperationStats {
            count,
            average_duration: total / count as f64,
            min_duration: min,
            max_duration: max,
            success_rate: ok as f64 / count as f64 * 100.0,
        }
    }

    /// Drop samples older than the TTL window. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(OffsetDateTime::now_utc())
    }

    /// [`MetricsRecorder::sweep_expired`] against an explicit clock.
    pub fn sweep_expired_at(&self, now: OffsetDateTime) -> usize {
        let Some(cutoff) = window_start(now, Duration::from_secs(self.cfg.ttl_secs)) else {
            return 0;
        };

        let mut series = self.series();
        let mut removed = 0;
        for buf in series.values_mut() {
            let before = buf.len();
            buf.retain(|s| s.timestamp >= cutoff);
            removed += before - buf.len();
        }
        series.retain(|_, buf| !buf.is_empty());

        trace!(removed, "swept expired metric samples");
        removed
    }

    /// Samples recorded in the last hour, divided by 60.
    pub fn throughput_per_minute(&self, operation_type: &str) -> f64 {
        self.count_since(operation_type, HOUR, OffsetDateTime::now_utc()) as f64 / 60.0
    }

    /// Mean duration of samples inside the trailing `window`; `0.0` when there are none.
    pub fn average_processing_time(&self, operation_type: &str, window: Duration) -> f64 {
        let now = OffsetDateTime::now_utc();
        let series = self.series();
        let Some(buf) = series.get(operation_type) else {
            return 0.0;
        };
        let cutoff = window_start(now, window);
        let (sum, n) = buf
            .iter()
            .filter(|s| cutoff.is_none_or(|c| s.timestamp >= c))
            .fold((0.0, 0usize), |(sum, n), s| (sum + s.duration_seconds, n + 1));
        if n == 0 { 0.0 } else { sum / n as f64 }
    }

    /// Percentage of failed samples across `operation_types` inside the trailing `window`.
    pub fn recent_error_rate(&self, operation_types: &[&str], window: Duration) -> f64 {
        let cutoff = window_start(OffsetDateTime::now_utc(), window);
        let series = self.series();
        let (failed, total) = operation_types
            .iter()
            .filter_map(|op| series.get(*op))
            .flatten()
            .filter(|s| cutoff.is_none_or(|c| s.timestamp >= c))
            .fold((0usize, 0usize), |(f, t), s| (f + usize::from(!s.success), t + 1));
        if total == 0 {
            0.0
        } else {
            failed as f64 / total as f64 * 100.0
        }
    }

    fn count_since(&self, operation_type: &str, window: Duration, now: OffsetDateTime) -> usize {
        let cutoff = window_start(now, window);
        self.series()
            .get(operation_type)
            .map(|buf| {
                buf.iter()
                    .filter(|s| cutoff.is_none_or(|c| s.timestamp >= c))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Copy of the retained samples for `operation_type`, oldest first.
    pub fn snapshot(&self, operation_type: &str) -> Vec<MetricSample> {
        self.series()
            .get(operation_type)
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, operation_type: &str) -> usize {
        self.series().get(operation_type).map_or(0, VecDeque::len)
    }

    pub fn operation_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.series().keys().cloned().collect();
        types.sort();
        types
    }
}

fn window_start(now: OffsetDateTime, window: Duration) -> Option<OffsetDateTime> {
    let span = time::Duration::try_from(window).ok()?;
    now.checked_sub(span)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn recorder(limit: usize) -> MetricsRecorder {
        MetricsRecorder::new(MetricsConfig {
            history_limit: limit,
            ..Default::default()
        })
    }

    #[test]
    fn history_is_capped_and_keeps_most_recent_in_order() {
        let rec = recorder(5);
        for i in 0..6 {
            rec.record(MetricSample::new("preview_build", i as f64, true));
        }

        let kept: Vec<f64> = rec
            .snapshot("preview_build")
            .iter()
            .map(|s| s.duration_seconds)
            .collect();
        assert_eq!(kept, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn statistics_are_zeroed_when_empty() {
        let rec = recorder(10);
        assert_eq!(rec.statistics("export_build"), OperationStats::default());
    }

    #[test]
    fn statistics_aggregate_durations_and_success() {
        let rec = recorder(10);
        rec.record(MetricSample::new("cli_execution", 1.0, true));
        rec.record(MetricSample::new("cli_execution", 3.0, false));
        rec.record(MetricSample::new("cli_execution", 2.0, true));
        rec.record(MetricSample::new("cli_execution", 2.0, true));

        let stats = rec.statistics("cli_execution");
        assert_eq!(stats.count, 4);
        assert_eq!(stats.average_duration, 2.0);
        assert_eq!(stats.min_duration, 1.0);
        assert_eq!(stats.max_duration, 3.0);
        assert_eq!(stats.success_rate, 75.0);
    }

    #[test]
    fn slow_samples_raise_alerts() {
        let rec = MetricsRecorder::new(MetricsConfig {
            slow_threshold_secs: 5.0,
            ..Default::default()
        });
        rec.record(
            MetricSample::new("export_build", 7.5, true)
                .with_tags(Labels::new().with(TAG_SESSION_ID, "s9")),
        );
        rec.record(MetricSample::new("export_build", 1.0, true));

        let alerts = rec.snapshot(OP_PERFORMANCE_ALERTS);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].tags.get(TAG_OPERATION_TYPE), Some("export_build"));
        assert_eq!(alerts[0].tags.get(TAG_SESSION_ID), Some("s9"));
        assert_eq!(alerts[0].tags.get(TAG_THRESHOLD), Some("5"));
        assert_eq!(rec.len("export_build"), 2);
    }

    #[test]
    fn alerts_can_be_disabled() {
        let rec = MetricsRecorder::new(MetricsConfig {
            slow_threshold_secs: 0.1,
            alerts_enabled: false,
            ..Default::default()
        });
        rec.record(MetricSample::new("preview_build", 10.0, true));
        assert_eq!(rec.len(OP_PERFORMANCE_ALERTS), 0);
    }

    #[test]
    fn sweep_drops_expired_samples_independently_of_cap() {
        let rec = recorder(100);
        let now = OffsetDateTime::now_utc();
        rec.record(MetricSample::new("preview_build", 1.0, true).at(now - time::Duration::hours(25)));
        rec.record(MetricSample::new("preview_build", 2.0, true).at(now - time::Duration::hours(2)));
        rec.record(MetricSample::new("export_build", 3.0, true).at(now - time::Duration::days(3)));

        assert_eq!(rec.sweep_expired_at(now), 2);
        assert_eq!(rec.len("preview_build"), 1);
        assert_eq!(rec.operation_types(), vec!["preview_build".to_string()]);
    }

    #[test]
    fn throughput_counts_last_hour() {
        let rec = recorder(100);
        let now = OffsetDateTime::now_utc();
        for _ in 0..6 {
            rec.record(MetricSample::new("preview_build", 1.0, true));
        }
        rec.record(MetricSample::new("preview_build", 1.0, true).at(now - time::Duration::hours(2)));

        assert!((rec.throughput_per_minute("preview_build") - 0.1).abs() < 1e-9);
        assert_eq!(rec.average_processing_time("preview_build", HOUR), 1.0);
        assert_eq!(rec.average_processing_time("missing", HOUR), 0.0);
    }

    #[test]
    fn error_rate_spans_operation_types() {
        let rec = recorder(100);
        rec.record(MetricSample::new("preview_build", 1.0, false));
        rec.record(MetricSample::new("export_build", 1.0, true));
        rec.record(MetricSample::new("export_build", 1.0, true));
        rec.record(MetricSample::new("export_build", 1.0, true));

        let rate = rec.recent_error_rate(&["preview_build", "export_build"], HOUR);
        assert_eq!(rate, 25.0);
        assert_eq!(rec.recent_error_rate(&["cli_execution"], HOUR), 0.0);
    }

    #[test]
    fn invalid_durations_and_disabled_recorder_are_ignored() {
        let rec = recorder(10);
        rec.record(MetricSample::new("preview_build", f64::NAN, true));
        rec.record(MetricSample::new("preview_build", -1.0, true));
        assert_eq!(rec.len("preview_build"), 0);

        let off = MetricsRecorder::new(MetricsConfig {
            enabled: false,
            ..Default::default()
        });
        off.record(MetricSample::new("preview_build", 1.0, true));
        assert_eq!(off.len("preview_build"), 0);
    }

    #[test]
    fn concurrent_writers_respect_cap() {
        let rec = Arc::new(recorder(50));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rec = Arc::clone(&rec);
                thread::spawn(move || {
                    for _ in 0..100 {
                        rec.record(MetricSample::new("cli_execution", 0.5, true));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(rec.len("cli_execution"), 50);
    }
}
