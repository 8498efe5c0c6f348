#![allow(dead_code)]

use std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use kiln_model::{CommandSpec, EngineConfig, PoolConfig, RetryStrategy};

/// Write an executable `sh` script named `name` into `dir`.
pub fn stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Compiler stub that writes `index.html` into the `--output` directory.
///
/// Arguments arrive as `<description> --output <dir> --target html5 ...`.
pub const BUILD_OK: &str = r#"out="$3"
mkdir -p "$out"
echo "<html></html>" > "$out/index.html"
echo "built $1""#;

/// Compiler stub that fails until its `attempts` counter reaches `succeed_on`.
pub fn flaky_compiler(counter: &Path, succeed_on: u32) -> String {
    format!(
        r#"n=$(cat "{c}" 2>/dev/null || echo 0)
n=$((n + 1))
echo "$n" > "{c}"
if [ "$n" -lt {succeed_on} ]; then
  echo "resource busy (attempt $n)" >&2
  exit 1
fi
{ok}"#,
        c = counter.display(),
        ok = BUILD_OK,
    )
}

pub fn sh(script: &str, timeout_ms: u64) -> CommandSpec {
    CommandSpec::new("sh", timeout_ms).args(["-c", script])
}

pub fn pool_config(capacity: usize) -> PoolConfig {
    PoolConfig {
        capacity,
        timeout_ms: 10_000,
        poll_interval_ms: 10,
        ..PoolConfig::default()
    }
}

/// Engine config rooted at `root` using `compiler`, with fast retries.
pub fn engine_config(root: &Path, compiler: &Path) -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.pool = pool_config(2);
    cfg.retry = RetryStrategy {
        first_ms: 10,
        ..RetryStrategy::default()
    };
    cfg.paths.sessions_dir = root.join("sessions");
    cfg.paths.exports_dir = root.join("exports");
    cfg.paths.compiler = compiler.display().to_string();
    cfg
}

pub fn description(root: &Path) -> PathBuf {
    let path = root.join("upload.json");
    std::fs::write(&path, r#"{"properties":{"name":"Space Pong"}}"#).unwrap();
    path
}
