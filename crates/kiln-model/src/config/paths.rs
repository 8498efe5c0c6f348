use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_ENTRY_FILE;

/// Filesystem layout, compiler location and public URL prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathsConfig {
    /// Root of per-session working areas (`<sessionsDir>/<session>/`).
    pub sessions_dir: PathBuf,
    /// Root of export bundles and archives.
    pub exports_dir: PathBuf,
    /// Compiler executable; a bare name is resolved through `PATH`.
    pub compiler: String,
    pub preview_url_base: String,
    pub download_url_base: String,
    /// File the compiler must write for the output to count as a build.
    pub entry_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sessions_dir: PathBuf::from("storage/sessions"),
            exports_dir: PathBuf::from("storage/exports"),
            compiler: "gdexport".into(),
            preview_url_base: "/preview".into(),
            download_url_base: "/download".into(),
            entry_file: DEFAULT_ENTRY_FILE.into(),
        }
    }
}

impl PathsConfig {
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(session_id)
    }

    /// Where a session's description lives once staged.
    pub fn description_path(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("game.json")
    }

    pub fn preview_dir(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("preview")
    }

    pub fn export_dir(&self, session_id: &str) -> PathBuf {
        self.exports_dir.join(session_id)
    }

    pub fn entry_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.entry_file)
    }

    pub fn preview_url(&self, session_id: &str) -> String {
        format!("{}/{}", self.preview_url_base.trim_end_matches('/'), session_id)
    }

    pub fn download_url(&self, session_id: &str) -> String {
        format!("{}/{}", self.download_url_base.trim_end_matches('/'), session_id)
    }
}
