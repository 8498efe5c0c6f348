use tracing::warn;
use tracing_subscriber::{Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::logger::{LoggerConfig, LoggerError, LoggerFormat, LoggerResult, Rfc3339Timer};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Install the global `tracing` subscriber described by `cfg`.
///
/// Fails with [`LoggerError::AlreadyInitialized`] when called twice. A local time zone that
/// cannot be read falls back to UTC with a warning.
///
/// ```no_run
/// use kiln_observe::{LoggerConfig, init_logger};
///
/// init_logger(&LoggerConfig::default()).expect("logger");
/// tracing::info!("ready");
/// ```
pub fn init_logger(cfg: &LoggerConfig) -> LoggerResult<()> {
    let (offset, tz_fallback) = match cfg.tz.resolve() {
        Ok(offset) => (offset, false),
        Err(_) => (time::UtcOffset::UTC, true),
    };
    let timer = Rfc3339Timer::with_offset(offset);

    tracing_subscriber::registry()
        .with(output_layer(cfg, timer)?)
        .with(cfg.level.to_env_filter())
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)?;

    if tz_fallback {
        warn!(tz = %cfg.tz, "local offset unavailable, logging in UTC");
    }
    Ok(())
}

fn output_layer(cfg: &LoggerConfig, timer: Rfc3339Timer) -> LoggerResult<BoxedLayer> {
    Ok(match cfg.format {
        LoggerFormat::Text => fmt::layer()
            .with_timer(timer)
            .with_ansi(cfg.ansi())
            .with_target(cfg.with_targets)
            .boxed(),
        LoggerFormat::Json => fmt::layer()
            .json()
            .with_timer(timer)
            .with_ansi(false)
            .with_target(cfg.with_targets)
            .with_current_span(true)
            .boxed(),
        LoggerFormat::Journald => journald_layer()?,
    })
}

#[cfg(target_os = "linux")]
fn journald_layer() -> LoggerResult<BoxedLayer> {
    let layer = tracing_journald::layer().map_err(|e| LoggerError::Journald(e.to_string()))?;
    Ok(layer.boxed())
}

#[cfg(not(target_os = "linux"))]
fn journald_layer() -> LoggerResult<BoxedLayer> {
    Err(LoggerError::Journald("only supported on linux".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_json_layers_build() {
        for format in [LoggerFormat::Text, LoggerFormat::Json] {
            let cfg = LoggerConfig {
                format,
                use_color: false,
                ..LoggerConfig::default()
            };
            assert!(output_layer(&cfg, Rfc3339Timer::default()).is_ok());
        }
    }

    #[test]
    #[cfg(not(target_os = "linux"))]
    fn journald_is_rejected_off_linux() {
        let cfg = LoggerConfig {
            format: LoggerFormat::Journald,
            ..LoggerConfig::default()
        };
        assert!(matches!(
            output_layer(&cfg, Rfc3339Timer::default()),
            Err(LoggerError::Journald(_))
        ));
    }

    #[test]
    fn second_install_is_rejected() {
        let cfg = LoggerConfig {
            use_color: false,
            ..LoggerConfig::default()
        };
        // Another test in this binary may have installed one first.
        let _ = init_logger(&cfg);
        assert!(matches!(init_logger(&cfg), Err(LoggerError::AlreadyInitialized)));
    }
}
