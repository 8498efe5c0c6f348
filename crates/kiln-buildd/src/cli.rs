use std::{path::PathBuf, time::Duration};

use clap::Parser;

use kiln_model::{ExportOptions, Flag};
use kiln_observe::{LoggerFormat, LoggerLevel};

/// Run one preview or export build and print the result as JSON.
#[derive(Debug, Parser)]
#[command(name = "kiln-buildd", version, about)]
pub struct Cli {
    /// Engine configuration (JSON). `KILN_*` variables override it.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Session identifier; names the working and output directories.
    #[arg(long)]
    pub session: String,

    /// Uploaded project description to compile.
    #[arg(long, value_name = "FILE")]
    pub description: PathBuf,

    /// Produce a packaged export instead of a preview.
    #[arg(long)]
    pub export: bool,

    #[arg(long, requires = "export")]
    pub no_minify: bool,

    #[arg(long, requires = "export")]
    pub mobile: bool,

    /// Seconds to wait for in-flight commands on shutdown.
    #[arg(long, default_value_t = 30, value_name = "SECS")]
    pub grace: u64,

    /// Write Prometheus text exposition here after the build.
    #[arg(long, value_name = "FILE")]
    pub metrics_out: Option<PathBuf>,

    /// Overrides `KILN_LOG_LEVEL`.
    #[arg(long)]
    pub log_level: Option<LoggerLevel>,

    /// Overrides `KILN_LOG_FORMAT`.
    #[arg(long)]
    pub log_format: Option<LoggerFormat>,
}

impl Cli {
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            minify: Flag::from(!self.no_minify),
            mobile_optimized: Flag::from(self.mobile),
        }
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace)
    }
}
