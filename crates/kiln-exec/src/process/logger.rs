use tracing::{debug, info, warn};

use kiln_model::WorkerId;

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_label(&self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

/// How compiler output is logged and captured.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    /// Lines longer than this are truncated in logs (captured output keeps them whole).
    pub max_line_length: usize,
    /// Log stdout at INFO instead of DEBUG.
    pub stdout_info: bool,
    /// Log stderr at WARN instead of DEBUG.
    pub stderr_warn: bool,
    /// Per-stream cap on captured output returned to the caller.
    pub max_captured_bytes: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_line_length: 4096,
            stdout_info: false,
            stderr_warn: true,
            max_captured_bytes: 1024 * 1024,
        }
    }
}

impl LogConfig {
    pub(crate) fn emit(&self, stream: Stream, worker: WorkerId, line: &str) {
        let line = truncate(line, self.max_line_length);
        match stream {
            Stream::Stdout if self.stdout_info => info!(%worker, stream = "stdout", "{line}"),
            Stream::Stderr if self.stderr_warn => warn!(%worker, stream = "stderr", "{line}"),
            _ => debug!(%worker, stream = stream.as_label(), "{line}"),
        }
    }
}

fn truncate(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
