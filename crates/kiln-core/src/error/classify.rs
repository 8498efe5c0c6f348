use kiln_model::ErrorClass;

use super::BuildError;

/// Map a failure onto its retry class.
///
/// This is the only place that inspects error variants for retry purposes;
/// retry logic downstream matches on [`ErrorClass`] exhaustively.
pub fn classify(err: &BuildError) -> ErrorClass {
    match err {
        BuildError::Cli(failure) => ErrorClass::CliFailure {
            retryable: failure.is_retryable(),
        },
        BuildError::Validation { issues } => ErrorClass::ValidationFailure {
            recoverable: BuildError::validation_recoverable(issues),
        },
        BuildError::Preview { retryable, .. } => ErrorClass::PreviewFailure {
            retryable: *retryable,
        },
        BuildError::Export { retryable, .. } => ErrorClass::ExportFailure {
            retryable: *retryable,
        },
        BuildError::Io { .. } | BuildError::Config(_) | BuildError::Internal(_) => ErrorClass::Unknown,
    }
}
