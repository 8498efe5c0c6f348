//! One-shot compiler processes.
//!
//! [`ProcessRunner::run`] spawns a [`CommandSpec`] with piped output, races it
//! against its timeout and a cancellation token, and kills the whole process
//! group when either fires. The group is also killed after a normal exit so
//! stray background children cannot keep the output pipes open.
mod logger;
pub use logger::{LogConfig, Stream};

use std::{
    process::{ExitStatus, Stdio},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use kiln_model::{CommandOutput, CommandSpec, ProcessLimits, WorkerId};

use crate::{
    ExecError,
    error::ExecResult,
    utils::{attach_limits, validate_limits},
};

/// How long to keep reading pipes after the process is gone.
const READER_GRACE: Duration = Duration::from_millis(250);

/// Output captured so far; shared with the reader task so an aborted reader
/// still leaves its lines behind.
type Captured = Arc<Mutex<String>>;

/// Spawns compiler processes with the configured limits and log handling.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    limits: ProcessLimits,
    log: LogConfig,
}

enum Ending {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

impl ProcessRunner {
    pub fn new(limits: ProcessLimits) -> ExecResult<Self> {
        validate_limits(&limits)?;
        Ok(Self {
            limits,
            log: LogConfig::default(),
        })
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    pub fn limits(&self) -> &ProcessLimits {
        &self.limits
    }

    /// Run `spec` to completion on behalf of `worker`.
    ///
    /// Non-zero exits are returned as `Ok` with `success == false`; only spawn
    /// failures, timeouts and cancellation are errors.
    pub async fn run(
        &self,
        spec: &CommandSpec,
        worker: WorkerId,
        cancel: &CancellationToken,
    ) -> ExecResult<CommandOutput> {
        spec.validate()?;
        let command = spec.command_line();
        trace!(
            %worker,
            command = %command,
            cwd = ?spec.working_dir(),
            env_len = spec.environment().len(),
            timeout_ms = spec.timeout_ms(),
            "spawning compiler process",
        );

        let mut cmd = self.build(spec);
        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: command.clone(),
            source,
        })?;
        // `Child::id` is gone once the child is reaped.
        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .map(|pipe| spawn_capture(pipe, Stream::Stdout, worker, self.log));
        let stderr = child
            .stderr
            .take()
            .map(|pipe| spawn_capture(pipe, Stream::Stderr, worker, self.log));

        let ending = tokio::select! {
            res = child.wait() => Ending::Exited(res),
            _ = tokio::time::sleep(spec.timeout()) => Ending::TimedOut,
            _ = cancel.cancelled() => Ending::Cancelled,
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        match ending {
            // Leftover background children would hold the pipes open.
            Ending::Exited(_) => kill_group(pid),
            _ => terminate(&mut child, pid, worker).await,
        }

        let stdout = collect(stdout, Stream::Stdout, worker).await;
        let stderr = collect(stderr, Stream::Stderr, worker).await;

        match ending {
            Ending::Exited(Ok(status)) => {
                debug!(
                    %worker,
                    exit_code = status.code(),
                    duration_ms,
                    "compiler process exited",
                );
                Ok(CommandOutput {
                    success: status.success(),
                    exit_code: status.code(),
                    stdout,
                    stderr,
                    duration_ms,
                    worker,
                })
            }
            Ending::Exited(Err(source)) => Err(ExecError::Wait { command, source }),
            Ending::TimedOut => {
                warn!(
                    %worker,
                    command = %command,
                    timeout_ms = spec.timeout_ms(),
                    "compiler process timed out; killed",
                );
                Err(ExecError::TimedOut {
                    command,
                    timeout_ms: spec.timeout_ms(),
                    stdout,
                })
            }
            Ending::Cancelled => {
                debug!(%worker, "cancellation requested; compiler process killed");
                Err(ExecError::Cancelled { command })
            }
        }
    }

    fn build(&self, spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(spec.program());
        cmd.args(spec.arg_list())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = spec.working_dir() {
            cmd.current_dir(dir);
        }
        for kv in spec.environment().iter() {
            cmd.env(kv.key(), kv.value());
        }
        #[cfg(unix)]
        cmd.process_group(0);
        attach_limits(&mut cmd, &self.limits);
        cmd
    }
}

/// Signal the child's process group. A no-op once the group is empty.
fn kill_group(pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) {
        // SAFETY: the child leads its own process group (see `process_group(0)`).
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
}

/// Kill the child and anything it started.
async fn terminate(child: &mut Child, pid: Option<u32>, worker: WorkerId) {
    kill_group(pid);
    if let Err(e) = child.kill().await {
        debug!(%worker, error = %e, "failed to kill compiler process");
    }
}

fn spawn_capture<R>(
    pipe: R,
    stream: Stream,
    worker: WorkerId,
    log: LogConfig,
) -> (JoinHandle<()>, Captured)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let captured = Captured::default();
    let handle = tokio::spawn(capture(pipe, stream, worker, log, captured.clone()));
    (handle, captured)
}

async fn capture<R>(pipe: R, stream: Stream, worker: WorkerId, log: LogConfig, captured: Captured)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let text = text.trim_end_matches(['\n', '\r']);
                log.emit(stream, worker, text);
                let mut buf = captured.lock().unwrap_or_else(|p| p.into_inner());
                if buf.len() < log.max_captured_bytes {
                    buf.push_str(text);
                    buf.push('\n');
                }
            }
            Err(e) => {
                debug!(%worker, stream = stream.as_label(), error = %e, "reading compiler output failed");
                break;
            }
        }
    }
}

/// Wait briefly for a reader to hit EOF, then take whatever it captured.
async fn collect(reader: Option<(JoinHandle<()>, Captured)>, stream: Stream, worker: WorkerId) -> String {
    let Some((handle, captured)) = reader else {
        return String::new();
    };
    let abort = handle.abort_handle();
    if tokio::time::timeout(READER_GRACE, handle).await.is_err() {
        abort.abort();
        debug!(%worker, stream = stream.as_label(), "pipe still open after exit; keeping partial output");
    }
    let mut buf = captured.lock().unwrap_or_else(|p| p.into_inner());
    std::mem::take(&mut *buf)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout_ms: u64) -> CommandSpec {
        CommandSpec::new("sh", timeout_ms).args(["-c", script])
    }

    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let runner = ProcessRunner::default();
        let out = runner
            .run(
                &sh("echo built; echo warned >&2; exit 3", 5_000),
                WorkerId::new(7),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout, "built\n");
        assert_eq!(out.stderr, "warned\n");
        assert_eq!(out.worker, WorkerId::new(7));
    }

    #[tokio::test]
    async fn environment_and_cwd_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let spec = sh("printf '%s:' \"$KILN_MARK\"; pwd", 5_000)
            .cwd(dir.path())
            .env(kiln_model::Env::new().with("KILN_MARK", "on"));
        let out = ProcessRunner::default()
            .run(&spec, WorkerId::new(1), &CancellationToken::new())
            .await
            .unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(out.stdout.trim_end(), format!("on:{}", canonical.display()));
    }

    #[tokio::test]
    async fn timeout_kills_the_process_tree() {
        let started = Instant::now();
        let err = ProcessRunner::default()
            .run(&sh("echo early; sleep 5; echo late", 200), WorkerId::new(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(3));
        match err {
            ExecError::TimedOut { timeout_ms, stdout, .. } => {
                assert_eq!(timeout_ms, 200);
                assert_eq!(stdout, "early\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_stops_the_process() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let err = ProcessRunner::default()
            .run(&sh("sleep 5", 10_000), WorkerId::new(1), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn background_child_does_not_swallow_output() {
        let started = Instant::now();
        let out = ProcessRunner::default()
            .run(&sh("echo built; sleep 3 &", 10_000), WorkerId::new(1), &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout, "built\n");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(out.duration_ms < 1_000);
    }

    #[tokio::test]
    async fn background_child_is_killed_after_exit() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late");
        let script = format!("(sleep 1; touch '{}') & echo started", marker.display());
        let out = ProcessRunner::default()
            .run(&sh(&script, 10_000), WorkerId::new(1), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.stdout, "started\n");
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = ProcessRunner::default()
            .run(
                &CommandSpec::new("kiln-definitely-missing-compiler", 1_000),
                WorkerId::new(1),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[tokio::test]
    async fn invalid_spec_is_rejected_before_spawn() {
        let err = ProcessRunner::default()
            .run(&CommandSpec::new("sh", 0), WorkerId::new(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::InvalidCommand(_)));
    }
}
