use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type SplitResult<T> = Result<T, SplitError>;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("WalkDir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Path error: {0}")]
    Path(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Package error: {0}")]
    Package(String),

    #[error("Install failed: {0}")]
    Install(#[from] InstallError),
}

/// Classification of a terminal install failure.
///
/// This is the copyable form carried by `Failed(reason)` in the install state
/// machine; [`InstallError`] carries the details. `DependencyUnsatisfied` is
/// only reported by the activation planner, which excludes the package
/// instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    MissingOrEmpty,
    SignatureMismatch,
    HashMismatch,
    ExtractionFailed,
    UnsupportedRuntime,
    MarkCreateFailed,
    GeneratedArtifactInvalid,
    DependencyUnsatisfied,
    InternalError,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureReason::MissingOrEmpty => "missing-or-empty",
            FailureReason::SignatureMismatch => "signature-mismatch",
            FailureReason::HashMismatch => "hash-mismatch",
            FailureReason::ExtractionFailed => "extraction-failed",
            FailureReason::UnsupportedRuntime => "unsupported-runtime",
            FailureReason::MarkCreateFailed => "mark-create-failed",
            FailureReason::GeneratedArtifactInvalid => "generated-artifact-invalid",
            FailureReason::DependencyUnsatisfied => "dependency-unsatisfied",
            FailureReason::InternalError => "internal-error",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Package file {} is missing or empty", .path.display())]
    MissingOrEmpty { path: PathBuf },

    #[error("Package {} is not signed by the trusted signer", .path.display())]
    SignatureMismatch { path: PathBuf },

    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Reported when the content hash could not be computed and the
    /// declared byte size did not match either.
    #[error("Size mismatch for {}: expected {expected} bytes, got {actual}", .path.display())]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Unsupported runtime: {0}")]
    UnsupportedRuntime(String),

    #[error("Failed to create installed marker {}: {source}", .path.display())]
    MarkCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Generated code {} is not usable", .path.display())]
    GeneratedArtifactInvalid { path: PathBuf },

    #[error("Internal error: {0}")]
    Internal(#[from] std::io::Error),
}

impl InstallError {
    pub fn reason(&self) -> FailureReason {
        match self {
            InstallError::MissingOrEmpty { .. } => FailureReason::MissingOrEmpty,
            InstallError::SignatureMismatch { .. } => FailureReason::SignatureMismatch,
            InstallError::HashMismatch { .. } | InstallError::SizeMismatch { .. } => {
                FailureReason::HashMismatch
            }
            InstallError::ExtractionFailed(_) => FailureReason::ExtractionFailed,
            InstallError::UnsupportedRuntime(_) => FailureReason::UnsupportedRuntime,
            InstallError::MarkCreateFailed { .. } => FailureReason::MarkCreateFailed,
            InstallError::GeneratedArtifactInvalid { .. } => {
                FailureReason::GeneratedArtifactInvalid
            }
            InstallError::Internal(_) => FailureReason::InternalError,
        }
    }

    /// Whether a fresh copy of the package bytes could fix this failure.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self.reason(),
            FailureReason::MissingOrEmpty
                | FailureReason::SignatureMismatch
                | FailureReason::HashMismatch
        )
    }
}

impl From<SplitError> for InstallError {
    fn from(err: SplitError) -> Self {
        match err {
            SplitError::Install(inner) => inner,
            SplitError::Io(io) => InstallError::Internal(io),
            other => InstallError::Internal(std::io::Error::other(other.to_string())),
        }
    }
}
