//! Preview and export build sequencing.
//!
//! A build stages its inputs, runs the compiler through a [`CommandExecutor`],
//! verifies the entry file and (for exports) packages the output. Every attempt
//! runs the whole sequence inside [`RetryPolicy::execute_with_retry`]; CLI failures
//! that survive the retries are wrapped into the target's own error variant so the
//! caller gets the build logs alongside the cause.
mod stage;
pub use stage::BuildStage;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use kiln_model::{
    CommandOutput, CommandSpec, EngineConfig, Env, ExportOptions, OP_EXPORT_BUILD,
    OP_PREVIEW_BUILD, PathsConfig, TimeoutMs,
};

use crate::{
    error::{BuildError, CoreResult},
    executor::{CommandExecutor, PackageArtifact, Packager},
    retry::RetryPolicy,
};

/// Compiler target used for both preview and export bundles.
const COMPILER_TARGET: &str = "html5";

/// What a successful build left on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifacts {
    pub output_dir: PathBuf,
    /// Present for exports only.
    pub package: Option<PackageArtifact>,
    /// Compiler output of the successful attempt.
    pub logs: Vec<String>,
}

/// Sequencer for a single build request.
#[derive(Clone)]
pub struct BuildPipeline {
    executor: Arc<dyn CommandExecutor>,
    packager: Arc<dyn Packager>,
    retry: RetryPolicy,
    paths: PathsConfig,
    timeout_ms: TimeoutMs,
    env: Env,
}

impl BuildPipeline {
    pub fn new(
        cfg: &EngineConfig,
        executor: Arc<dyn CommandExecutor>,
        packager: Arc<dyn Packager>,
    ) -> Self {
        Self {
            executor,
            packager,
            retry: RetryPolicy::from_strategy(&cfg.retry),
            paths: cfg.paths.clone(),
            timeout_ms: cfg.pool.timeout_ms,
            env: Env::new(),
        }
    }

    /// Extra environment passed to every compiler invocation.
    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    pub fn executor(&self) -> &Arc<dyn CommandExecutor> {
        &self.executor
    }

    /// Compiler invocation for a browser preview.
    ///
    /// The compiler has no separate preview target; a preview is an unminified
    /// `html5` build.
    pub fn preview_command(&self, session_id: &str, description: &Path, output_dir: &Path) -> CommandSpec {
        self.base_command(session_id, description, output_dir)
            .args(["--minify", "false"])
    }

    /// Compiler invocation for a packaged export.
    pub fn export_command(
        &self,
        session_id: &str,
        description: &Path,
        output_dir: &Path,
        options: &ExportOptions,
    ) -> CommandSpec {
        let cmd = self
            .base_command(session_id, description, output_dir)
            .args(["--minify", options.minify.as_cli_value()]);
        if options.mobile_optimized.is_enabled() {
            cmd.arg("--mobile-optimized")
        } else {
            cmd
        }
    }

    fn base_command(&self, session_id: &str, description: &Path, output_dir: &Path) -> CommandSpec {
        CommandSpec::new(&self.paths.compiler, self.timeout_ms)
            .arg(description.display().to_string())
            .arg("--output")
            .arg(output_dir.display().to_string())
            .args(["--target", COMPILER_TARGET])
            .cwd(self.paths.session_dir(session_id))
            .env(self.env.clone())
    }

    /// Build the preview for `session_id` into `<sessions>/<id>/preview`.
    pub async fn preview(&self, session_id: &str, description: &Path) -> CoreResult<BuildArtifacts> {
        BuildStage::Requested.trace(OP_PREVIEW_BUILD, session_id);
        let out = self.paths.preview_dir(session_id);
        let out_ref = out.as_path();

        let res = self
            .retry
            .execute_with_retry(
                move || self.preview_attempt(session_id, description, out_ref),
                OP_PREVIEW_BUILD,
            )
            .await;

        self.finish(OP_PREVIEW_BUILD, session_id, res, |err| wrap_preview(err, &out))
    }

    /// Build and package the export for `session_id` into `<exports>/<id>`.
    pub async fn export(
        &self,
        session_id: &str,
        description: &Path,
        options: &ExportOptions,
    ) -> CoreResult<BuildArtifacts> {
        BuildStage::Requested.trace(OP_EXPORT_BUILD, session_id);
        let out = self.paths.export_dir(session_id);
        let out_ref = out.as_path();

        let res = self
            .retry
            .execute_with_retry(
                move || self.export_attempt(session_id, description, out_ref, options),
                OP_EXPORT_BUILD,
            )
            .await;

        self.finish(OP_EXPORT_BUILD, session_id, res, |err| wrap_export(err, &out, options))
    }

    fn finish(
        &self,
        operation_type: &str,
        session_id: &str,
        res: CoreResult<BuildArtifacts>,
        wrap: impl FnOnce(BuildError) -> BuildError,
    ) -> CoreResult<BuildArtifacts> {
        match res {
            Ok(artifacts) => {
                BuildStage::Succeeded.trace(operation_type, session_id);
                Ok(artifacts)
            }
            Err(err) => {
                BuildStage::Failed.trace(operation_type, session_id);
                Err(wrap(err))
            }
        }
    }

    async fn preview_attempt(
        &self,
        session_id: &str,
        description: &Path,
        out: &Path,
    ) -> CoreResult<BuildArtifacts> {
        let staged = self.stage(session_id, description, out).await?;
        BuildStage::Staged.trace(OP_PREVIEW_BUILD, session_id);

        let cmd = self.preview_command(session_id, &staged, out);
        BuildStage::Executing.trace(OP_PREVIEW_BUILD, session_id);
        let output = self.executor.execute(&cmd).await?;
        let logs = output_lines(&output);

        BuildStage::Verifying.trace(OP_PREVIEW_BUILD, session_id);
        if !self.entry_exists(out).await? {
            return Err(BuildError::Preview {
                message: format!("entry file `{}` was not produced", self.paths.entry_file),
                path: out.to_path_buf(),
                logs,
                retryable: false,
                source: None,
            });
        }

        Ok(BuildArtifacts {
            output_dir: out.to_path_buf(),
            package: None,
            logs,
        })
    }

    async fn export_attempt(
        &self,
        session_id: &str,
        description: &Path,
        out: &Path,
        options: &ExportOptions,
    ) -> CoreResult<BuildArtifacts> {
        let staged = self.stage(session_id, description, out).await?;
        BuildStage::Staged.trace(OP_EXPORT_BUILD, session_id);

        let cmd = self.export_command(session_id, &staged, out, options);
        BuildStage::Executing.trace(OP_EXPORT_BUILD, session_id);
        let output = self.executor.execute(&cmd).await?;
        let logs = output_lines(&output);

        BuildStage::Verifying.trace(OP_EXPORT_BUILD, session_id);
        if !self.entry_exists(out).await? {
            return Err(BuildError::Export {
                message: format!("entry file `{}` was not produced", self.paths.entry_file),
                path: out.to_path_buf(),
                options: *options,
                logs,
                retryable: false,
                source: None,
            });
        }

        BuildStage::Packaging.trace(OP_EXPORT_BUILD, session_id);
        let archive = self
            .paths
            .exports_dir
            .join(format!("{session_id}.{}", self.packager.extension()));
        let package = self.package(out, &archive, options, &logs).await?;

        Ok(BuildArtifacts {
            output_dir: out.to_path_buf(),
            package: Some(package),
            logs,
        })
    }

    /// Create the output directory and put the description at its canonical session path.
    async fn stage(&self, session_id: &str, description: &Path, out: &Path) -> CoreResult<PathBuf> {
        tokio::fs::create_dir_all(out)
            .await
            .map_err(|e| BuildError::io(format!("creating {}", out.display()), e))?;

        let staged = self.paths.description_path(session_id);
        if same_file(description, &staged).await {
            return Ok(staged);
        }

        let session_dir = self.paths.session_dir(session_id);
        tokio::fs::create_dir_all(&session_dir)
            .await
            .map_err(|e| BuildError::io(format!("creating {}", session_dir.display()), e))?;
        tokio::fs::copy(description, &staged)
            .await
            .map_err(|e| BuildError::io(format!("staging {}", description.display()), e))?;
        Ok(staged)
    }

    async fn entry_exists(&self, out: &Path) -> CoreResult<bool> {
        let entry = self.paths.entry_path(out);
        tokio::fs::try_exists(&entry)
            .await
            .map_err(|e| BuildError::io(format!("checking {}", entry.display()), e))
    }

    async fn package(
        &self,
        out: &Path,
        archive: &Path,
        options: &ExportOptions,
        logs: &[String],
    ) -> CoreResult<PackageArtifact> {
        let export_error = |message: String, retryable: bool, source: Option<BuildError>| BuildError::Export {
            message,
            path: out.to_path_buf(),
            options: *options,
            logs: logs.to_vec(),
            retryable,
            source: source.map(Box::new),
        };

        match self.packager.package(out, archive).await {
            Ok(_) => {}
            Err(err @ BuildError::Export { .. }) => return Err(err),
            Err(err) => return Err(export_error("packaging failed".into(), true, Some(err))),
        }

        match tokio::fs::metadata(archive).await {
            Ok(meta) if meta.is_file() => Ok(PackageArtifact {
                path: archive.to_path_buf(),
                size_bytes: meta.len(),
            }),
            _ => Err(export_error(
                format!("package {} was not created", archive.display()),
                false,
                None,
            )),
        }
    }
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn output_lines(output: &CommandOutput) -> Vec<String> {
    output
        .stderr
        .lines()
        .chain(output.stdout.lines())
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect()
}

fn wrap_preview(err: BuildError, out: &Path) -> BuildError {
    match err {
        BuildError::Cli(failure) => BuildError::Preview {
            message: failure.to_string(),
            path: out.to_path_buf(),
            logs: failure.log_lines(),
            retryable: failure.is_retryable(),
            source: Some(Box::new(BuildError::Cli(failure))),
        },
        other => other,
    }
}

fn wrap_export(err: BuildError, out: &Path, options: &ExportOptions) -> BuildError {
    match err {
        BuildError::Cli(failure) => BuildError::Export {
            message: failure.to_string(),
            path: out.to_path_buf(),
            options: *options,
            logs: failure.log_lines(),
            retryable: failure.is_retryable(),
            source: Some(Box::new(BuildError::Cli(failure))),
        },
        other => other,
    }
}


#[cfg(test)]
mod tests {
    use std::sync::{Arc, atomic::Ordering};

    use kiln_model::{EngineConfig, ErrorClass, Flag, RetryStrategy};

    use super::testing::{FakePackager, PackMode, ScriptedExecutor, Step};
    use super::*;
    use crate::error::{CliFailure, classify};

    fn config(root: &Path) -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.paths.sessions_dir = root.join("sessions");
        cfg.paths.exports_dir = root.join("exports");
        cfg.retry = RetryStrategy {
            first_ms: 1,
            ..RetryStrategy::default()
        };
        cfg
    }

    fn description(root: &Path) -> PathBuf {
        let path = root.join("incoming.json");
        std::fs::write(&path, r#"{"properties":{"name":"demo"}}"#).unwrap();
        path
    }

    fn pipeline(root: &Path, exec: &Arc<ScriptedExecutor>, pack: &Arc<FakePackager>) -> BuildPipeline {
        BuildPipeline::new(
            &config(root),
            Arc::clone(exec) as Arc<dyn CommandExecutor>,
            Arc::clone(pack) as Arc<dyn Packager>,
        )
    }

    #[tokio::test]
    async fn preview_stages_description_and_builds() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = Arc::new(ScriptedExecutor::default());
        let pack = Arc::new(FakePackager::new(PackMode::Write));
        let p = pipeline(tmp.path(), &exec, &pack);

        let art = p.preview("s1", &description(tmp.path())).await.unwrap();

        let out = tmp.path().join("sessions/s1/preview");
        assert_eq!(art.output_dir, out);
        assert!(art.package.is_none());
        assert!(tmp.path().join("sessions/s1/game.json").is_file());
        assert_eq!(pack.calls.load(Ordering::SeqCst), 0);

        let cmd = exec.last();
        assert_eq!(cmd.program(), "gdexport");
        assert_eq!(
            cmd.arg_list()[1..],
            [
                "--output".to_string(),
                out.display().to_string(),
                "--target".into(),
                "html5".into(),
                "--minify".into(),
                "false".into(),
            ]
        );
        assert_eq!(cmd.working_dir(), Some(tmp.path().join("sessions/s1").as_path()));
    }

    #[tokio::test]
    async fn description_already_in_place_is_not_copied_over_itself() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = Arc::new(ScriptedExecutor::default());
        let pack = Arc::new(FakePackager::new(PackMode::Write));
        let p = pipeline(tmp.path(), &exec, &pack);

        let staged = tmp.path().join("sessions/s1/game.json");
        std::fs::create_dir_all(staged.parent().unwrap()).unwrap();
        std::fs::write(&staged, "{}").unwrap();

        p.preview("s1", &staged).await.unwrap();
        assert_eq!(std::fs::read_to_string(&staged).unwrap(), "{}");
    }

    #[tokio::test]
    async fn missing_entry_file_fails_without_retry() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = Arc::new(ScriptedExecutor::new([Step::Silent]));
        let pack = Arc::new(FakePackager::new(PackMode::Write));
        let p = pipeline(tmp.path(), &exec, &pack);

        let err = p.preview("s1", &description(tmp.path())).await.unwrap_err();
        assert_eq!(exec.calls(), 1);
        assert_eq!(classify(&err), ErrorClass::PreviewFailure { retryable: false });
        match err {
            BuildError::Preview { logs, .. } => assert_eq!(logs, vec!["compiled".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transient_cli_failure_recovers() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = Arc::new(ScriptedExecutor::new([Step::Fail(CliFailure::exited(
            "gdexport",
            Some(1),
            "",
            "resource busy",
        ))]));
        let pack = Arc::new(FakePackager::new(PackMode::Write));
        let p = pipeline(tmp.path(), &exec, &pack);

        p.preview("s1", &description(tmp.path())).await.unwrap();
        assert_eq!(exec.calls(), 2);
    }

    #[tokio::test]
    async fn exhausted_cli_failure_is_wrapped_with_logs() {
        let tmp = tempfile::tempdir().unwrap();
        let busy = || Step::Fail(CliFailure::exited("gdexport", Some(2), "partial", "resource busy"));
        let exec = Arc::new(ScriptedExecutor::new([busy(), busy(), busy()]));
        let pack = Arc::new(FakePackager::new(PackMode::Write));
        let p = pipeline(tmp.path(), &exec, &pack);

        let err = p.preview("s1", &description(tmp.path())).await.unwrap_err();
        assert_eq!(exec.calls(), 3);
        match &err {
            BuildError::Preview {
                logs,
                retryable,
                source,
                ..
            } => {
                assert_eq!(logs, &vec!["resource busy".to_string(), "partial".to_string()]);
                assert!(*retryable);
                assert!(matches!(source.as_deref(), Some(BuildError::Cli(_))));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn export_packages_output() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = Arc::new(ScriptedExecutor::default());
        let pack = Arc::new(FakePackager::new(PackMode::Write));
        let p = pipeline(tmp.path(), &exec, &pack);
        let options = ExportOptions {
            minify: Flag::enabled(),
            mobile_optimized: Flag::enabled(),
        };

        let art = p.export("s2", &description(tmp.path()), &options).await.unwrap();
        let package = art.package.unwrap();
        assert_eq!(package.path, tmp.path().join("exports/s2.tar.gz"));
        assert_eq!(package.size_bytes, 64);
        assert_eq!(art.output_dir, tmp.path().join("exports/s2"));

        let args = exec.last().arg_list().to_vec();
        assert!(args.windows(2).any(|w| w == ["--minify", "true"]));
        assert_eq!(args.last().map(String::as_str), Some("--mobile-optimized"));
    }

    #[tokio::test]
    async fn vanished_package_is_not_retried() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = Arc::new(ScriptedExecutor::default());
        let pack = Arc::new(FakePackager::new(PackMode::Vanish));
        let p = pipeline(tmp.path(), &exec, &pack);

        let err = p
            .export("s3", &description(tmp.path()), &ExportOptions::default())
            .await
            .unwrap_err();
        assert_eq!(classify(&err), ErrorClass::ExportFailure { retryable: false });
        assert_eq!(pack.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn packager_errors_are_retried_until_exhausted() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = Arc::new(ScriptedExecutor::default());
        let pack = Arc::new(FakePackager::new(PackMode::Error));
        let p = pipeline(tmp.path(), &exec, &pack);

        let err = p
            .export("s4", &description(tmp.path()), &ExportOptions::default())
            .await
            .unwrap_err();
        assert_eq!(classify(&err), ErrorClass::ExportFailure { retryable: true });
        assert_eq!(pack.calls.load(Ordering::SeqCst), 3);
        assert_eq!(exec.calls(), 3);
    }

    #[tokio::test]
    async fn missing_compiler_fails_fast() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = Arc::new(ScriptedExecutor::new([Step::Fail(CliFailure::exited(
            "gdexport",
            Some(127),
            "",
            "gdexport: command not found",
        ))]));
        let pack = Arc::new(FakePackager::new(PackMode::Write));
        let p = pipeline(tmp.path(), &exec, &pack);

        let err = p
            .export("s5", &description(tmp.path()), &ExportOptions::default())
            .await
            .unwrap_err();
        assert_eq!(exec.calls(), 1);
        assert_eq!(classify(&err), ErrorClass::ExportFailure { retryable: false });
    }
}
