use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Env, TimeoutMs},
    error::{ModelError, ModelResult},
};

/// Immutable description of one external program invocation.
///
/// Built fresh for every attempt and never mutated once handed to the pool.
/// The builder methods consume `self`, so a descriptor can only change while it is being assembled.
///
/// # Examples
/// ```
/// use kiln_model::CommandSpec;
///
/// let cmd = CommandSpec::new("gdexport", 300_000)
///     .args(["game.json", "--output", "out"])
///     .cwd("/srv/sessions/s1");
///
/// assert_eq!(cmd.program(), "gdexport");
/// assert_eq!(cmd.arg_list().len(), 3);
/// assert!(cmd.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpec {
    program: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    cwd: Option<PathBuf>,
    timeout_ms: TimeoutMs,
    #[serde(default)]
    env: Env,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, timeout_ms: TimeoutMs) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout_ms,
            env: Env::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Working directory. If unset, the child inherits the parent's.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arg_list(&self) -> &[String] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn environment(&self) -> &Env {
        &self.env
    }

    pub fn timeout_ms(&self) -> TimeoutMs {
        self.timeout_ms
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Program and arguments joined with spaces, for logs and error payloads.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Rules:
    /// - `program` is not empty or whitespace-only;
    /// - `timeout_ms` is non-zero.
    pub fn validate(&self) -> ModelResult<()> {
        if self.program.trim().is_empty() {
            return Err(ModelError::InvalidCommand("program is empty".into()));
        }
        if self.timeout_ms == 0 {
            return Err(ModelError::InvalidCommand("timeout must be non-zero".into()));
        }
        Ok(())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CommandSpec(program='{}', args={}, cwd={:?}, timeout_ms={}, env={})",
            self.program,
            self.args.len(),
            self.cwd,
            self.timeout_ms,
            self.env.len(),
        )
    }
}
