use serde::Serialize;

use super::{BuildError, CliFailureKind, ValidationKind};

/// Caller-facing summary of a failed build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub error_type: &'static str,
    pub user_message: String,
    pub suggested_action: String,
    pub retryable: bool,
    pub session_id: String,
}

impl BuildError {
    /// Stable label grouping failures for tracking and suggestions.
    pub fn kind_label(&self) -> &'static str {
        match self {
            BuildError::Cli(_) => "cli_error",
            BuildError::Validation { .. } => "validation_error",
            BuildError::Preview { .. } => "preview_error",
            BuildError::Export { .. } => "export_error",
            BuildError::Io { .. } | BuildError::Config(_) | BuildError::Internal(_) => "unknown_error",
        }
    }

    /// Human-readable explanation suitable for an end user.
    pub fn user_message(&self) -> String {
        match self {
            BuildError::Cli(f) => {
                if f.kind == CliFailureKind::SpawnFailed || f.is_not_found() {
                    "The game compiler is not installed or not on the PATH.".into()
                } else if f.is_permission_denied() {
                    "Permission denied while running the game compiler.".into()
                } else if f.is_timeout() {
                    "The game build timed out. Try a simpler game.".into()
                } else if f.kind == CliFailureKind::PoolClosed {
                    "The build service is shutting down. Try again shortly.".into()
                } else {
                    "The game compiler failed to build your game.".into()
                }
            }
            BuildError::Validation { issues } => match issues.as_slice() {
                [] => "The game description is invalid.".into(),
                [single] => describe_issue(single.kind, &single.field),
                many => format!(
                    "The game description has {} validation errors that need fixing.",
                    many.len()
                ),
            },
            BuildError::Preview { .. } => {
                "We could not build a preview of your game. Check the game structure and try again."
                    .into()
            }
            BuildError::Export { .. } => {
                "We could not create a downloadable package of your game.".into()
            }
            BuildError::Io { .. } | BuildError::Config(_) | BuildError::Internal(_) => {
                "An unexpected error occurred while building your game.".into()
            }
        }
    }

    /// Next step the operator or user should take.
    pub fn suggested_action(&self) -> String {
        match self {
            BuildError::Cli(f) if f.kind == CliFailureKind::SpawnFailed || f.is_not_found() => {
                format!(
                    "Install the compiler (for example with `npm install -g {}`) and make sure it is on the PATH.",
                    f.command.split_whitespace().next().unwrap_or("the compiler")
                )
            }
            BuildError::Cli(f) if f.is_permission_denied() => {
                "Check the compiler's executable bit and the session directory permissions.".into()
            }
            BuildError::Cli(f) if f.is_timeout() => {
                "Reduce the number of objects and events, or raise the command timeout.".into()
            }
            BuildError::Cli(_) => "Retry the build; if it keeps failing, inspect the build logs.".into(),
            BuildError::Validation { .. } if self.class().is_retryable() => {
                "Fix the reported fields and build again.".into()
            }
            BuildError::Validation { .. } => "Regenerate the game from a basic template.".into(),
            BuildError::Preview { retryable: true, .. } | BuildError::Export { retryable: true, .. } => {
                "Retry the build in a moment.".into()
            }
            BuildError::Preview { .. } => "Try an export build instead of a preview.".into(),
            BuildError::Export { .. } => "Try exporting without mobile optimization.".into(),
            BuildError::Io { .. } | BuildError::Config(_) | BuildError::Internal(_) => {
                "Retry the build; contact support if the problem persists.".into()
            }
        }
    }

    pub fn report(&self, session_id: &str) -> ErrorReport {
        ErrorReport {
            error_type: self.kind_label(),
            user_message: self.user_message(),
            suggested_action: self.suggested_action(),
            retryable: self.class().is_retryable(),
            session_id: session_id.to_string(),
        }
    }
}

fn describe_issue(kind: ValidationKind, field: &str) -> String {
    let subject = match field {
        "properties.name" | "name" => "game name".to_string(),
        other => format!("field `{other}`"),
    };
    match kind {
        ValidationKind::Required => format!("The {subject} is required."),
        ValidationKind::Type => format!("The {subject} has the wrong type."),
        ValidationKind::Constraint => format!("The {subject} is out of range."),
        ValidationKind::Structure => "The game description has an invalid structure.".into(),
        ValidationKind::Other => format!("The {subject} is invalid."),
    }
}

/// Alternatives to offer once the same kind of failure keeps happening.
pub fn fallback_suggestions(error_type: &str) -> Vec<String> {
    let items: &[&str] = match error_type {
        "cli_error" => &[
            "Try creating a simpler game with fewer objects",
            "Use a basic game template instead of complex generation",
        ],
        "validation_error" => &[
            "Start with a basic game template",
            "Try describing your game in simpler terms",
        ],
        "preview_error" => &[
            "Try exporting the game directly instead of preview",
            "Simplify the game by removing complex elements",
        ],
        "export_error" => &[
            "Try exporting without mobile optimization",
            "Export without minification",
        ],
        _ => &[],
    };
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::error::{CliFailure, ValidationIssue};

    #[test]
    fn cli_messages_name_the_cause() {
        let nf = BuildError::from(CliFailure::exited("gdexport", Some(127), "", "command not found"));
        assert!(nf.user_message().contains("PATH"));
        assert!(nf.suggested_action().contains("npm install -g gdexport"));

        let pd = BuildError::from(CliFailure::exited("gdexport", Some(1), "", "permission denied"));
        assert!(pd.user_message().contains("Permission denied"));

        let to = BuildError::from(CliFailure::exited("gdexport", Some(124), "", "timeout"));
        assert!(to.user_message().contains("timed out"));
    }

    #[test]
    fn validation_messages_count_issues() {
        let one = BuildError::Validation {
            issues: vec![ValidationIssue::new(ValidationKind::Required, "properties.name", "is required")],
        };
        let msg = one.user_message();
        assert!(msg.contains("game name") && msg.contains("required"));

        let two = BuildError::Validation {
            issues: vec![
                ValidationIssue::new(ValidationKind::Required, "properties.name", "is required"),
                ValidationIssue::new(ValidationKind::Type, "layouts", "must be an array"),
            ],
        };
        assert!(two.user_message().contains("2 validation errors"));
    }

    #[test]
    fn report_reflects_classification() {
        let err = BuildError::Preview {
            message: "entry file missing".into(),
            path: PathBuf::from("/p"),
            logs: vec![],
            retryable: false,
            source: None,
        };
        let report = err.report("s1");
        assert_eq!(report.error_type, "preview_error");
        assert!(!report.retryable);
        assert_eq!(report.session_id, "s1");
        assert!(report.user_message.contains("preview"));
    }

    #[test]
    fn suggestions_exist_for_each_tracked_kind() {
        for kind in ["cli_error", "validation_error", "preview_error", "export_error"] {
            assert_eq!(fallback_suggestions(kind).len(), 2, "{kind}");
        }
        assert!(fallback_suggestions("unknown_error").is_empty());
    }
}
