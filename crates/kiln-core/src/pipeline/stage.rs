use std::fmt;

use tracing::debug;

/// Position of a build request in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStage {
    Requested,
    /// Output directory created and description in place.
    Staged,
    Executing,
    /// Checking that the compiler produced the entry file.
    Verifying,
    /// Export only: archiving the output directory.
    Packaging,
    Succeeded,
    Failed,
}

impl BuildStage {
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildStage::Requested => "requested",
            BuildStage::Staged => "staged",
            BuildStage::Executing => "executing",
            BuildStage::Verifying => "verifying",
            BuildStage::Packaging => "packaging",
            BuildStage::Succeeded => "succeeded",
            BuildStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildStage::Succeeded | BuildStage::Failed)
    }

    /// Emit the stage transition for `session_id` at debug level.
    pub fn trace(&self, operation_type: &str, session_id: &str) {
        debug!(
            operation_type,
            session_id,
            stage = self.as_label(),
            "build stage"
        );
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
