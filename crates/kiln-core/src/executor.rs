//! Seams between the pipeline and the outside world.
//!
//! The pipeline never spawns processes or writes archives itself; it goes through
//! a [`CommandExecutor`] (the worker pool) and a [`Packager`].
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;

use kiln_model::{CommandOutput, CommandSpec, PoolStats};

use crate::error::BuildError;

/// Runs external commands.
///
/// A non-zero exit must surface as [`BuildError::Cli`], never as an `Ok` output.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Executor name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Run one command to completion or timeout.
    async fn execute(&self, cmd: &CommandSpec) -> Result<CommandOutput, BuildError>;

    /// Run all commands at once; results are index-aligned with `cmds`.
    ///
    /// Non-zero exits are reported per entry; only process-level failures fail the batch.
    async fn execute_concurrently(&self, cmds: &[CommandSpec]) -> Result<Vec<CommandOutput>, BuildError>;

    fn stats(&self) -> PoolStats;

    /// Stop accepting work, wait up to `grace` for in-flight commands, then terminate the rest.
    async fn shutdown(&self, grace: Duration);
}

/// Archive produced from an export directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Turns an output directory into a single downloadable file.
#[async_trait]
pub trait Packager: Send + Sync {
    /// File extension of produced archives, without the leading dot.
    fn extension(&self) -> &'static str;

    /// Archive the contents of `source_dir` into `archive_path`.
    async fn package(&self, source_dir: &Path, archive_path: &Path) -> Result<PackageArtifact, BuildError>;
}
