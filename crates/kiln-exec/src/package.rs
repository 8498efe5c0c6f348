//! Gzipped tarball packager backed by the system `tar`.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use kiln_core::{
    error::BuildError,
    executor::{PackageArtifact, Packager},
};

use crate::{ExecError, error::ExecResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Archives an export directory with `tar -czf`.
#[derive(Debug, Clone)]
pub struct TarPackager {
    program: String,
    timeout: Duration,
}

impl Default for TarPackager {
    fn default() -> Self {
        Self {
            program: "tar".into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TarPackager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different `tar` binary (e.g. `gtar`).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn archive(&self, source_dir: &Path, archive_path: &Path) -> ExecResult<PackageArtifact> {
        if !tokio::fs::metadata(source_dir).await?.is_dir() {
            return Err(archive_error(source_dir, "source is not a directory"));
        }
        if let Some(parent) = archive_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        debug!(source = %source_dir.display(), archive = %archive_path.display(), "packaging export");
        let run = Command::new(&self.program)
            .arg("-czf")
            .arg(archive_path)
            .arg("-C")
            .arg(source_dir)
            .arg(".")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                archive_error(
                    source_dir,
                    format!("{} timed out after {}ms", self.program, self.timeout.as_millis()),
                )
            })?
            .map_err(|source| ExecError::Spawn {
                command: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(archive_error(
                source_dir,
                format!(
                    "{} exited with {:?}: {}",
                    self.program,
                    output.status.code(),
                    stderr.trim()
                ),
            ));
        }

        let size_bytes = tokio::fs::metadata(archive_path).await?.len();
        info!(archive = %archive_path.display(), size_bytes, "export packaged");
        Ok(PackageArtifact {
            path: archive_path.to_path_buf(),
            size_bytes,
        })
    }
}

fn archive_error(path: &Path, reason: impl Into<String>) -> ExecError {
    ExecError::Archive {
        path: PathBuf::from(path),
        reason: reason.into(),
    }
}

#[async_trait]
impl Packager for TarPackager {
    fn extension(&self) -> &'static str {
        "tar.gz"
    }

    async fn package(&self, source_dir: &Path, archive_path: &Path) -> Result<PackageArtifact, BuildError> {
        Ok(self.archive(source_dir, archive_path).await?)
    }
}
