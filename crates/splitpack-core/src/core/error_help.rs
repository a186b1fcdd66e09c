//! Remediation hints attached to errors shown by the CLI.

use super::error::{FailureReason, SplitError};

/// Errors that can suggest what the user should do next.
pub trait ErrorHelp {
    fn help(&self) -> Option<&'static str>;
}

impl ErrorHelp for FailureReason {
    fn help(&self) -> Option<&'static str> {
        match self {
            FailureReason::MissingOrEmpty => {
                Some("Download the package into the store before installing it.")
            }
            FailureReason::SignatureMismatch => Some(
                "The package was signed by a different key. Check `trusted_signer` in config.yaml.",
            ),
            FailureReason::HashMismatch => {
                Some("The package bytes are corrupted. Download it again and retry.")
            }
            FailureReason::ExtractionFailed => {
                Some("The package archive could not be unpacked. Re-download it and retry.")
            }
            FailureReason::UnsupportedRuntime => {
                Some("This package requires a newer platform level than the host provides.")
            }
            FailureReason::MarkCreateFailed => {
                Some("The store directory is not writable. Check permissions and free space.")
            }
            FailureReason::GeneratedArtifactInvalid => Some(
                "Generated code failed validation. Set `allow_fallback_mode: true` to run without it.",
            ),
            FailureReason::DependencyUnsatisfied => {
                Some("Install the package's dependencies first.")
            }
            FailureReason::InternalError => None,
        }
    }
}

impl ErrorHelp for SplitError {
    fn help(&self) -> Option<&'static str> {
        match self {
            SplitError::Install(err) => err.reason().help(),
            SplitError::Yaml(_) => Some("Check the manifest or config file for YAML syntax errors."),
            SplitError::Config(_) => Some("Run `splitpack status` to see the active configuration."),
            _ => None,
        }
    }
}

/// Render an error followed by a hint line when one is available.
pub fn format_error_with_help(err: &SplitError) -> String {
    match err.help() {
        Some(help) => format!("Error: {}\n  help: {}", err, help),
        None => format!("Error: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::InstallError;

    #[test]
    fn test_format_error_with_help_for_install_error() {
        let err = SplitError::Install(InstallError::ExtractionFailed("truncated".to_string()));
        let text = format_error_with_help(&err);
        assert!(text.contains("truncated"));
        assert!(text.contains("help:"));
    }

    #[test]
    fn test_format_error_without_help() {
        let err = SplitError::Path("nowhere".to_string());
        let text = format_error_with_help(&err);
        assert_eq!(text, "Error: Path error: nowhere");
    }
}
