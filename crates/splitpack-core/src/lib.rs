//! Core types for Splitpack.
//!
//! Holds the error taxonomy shared by every install stage, platform path
//! helpers, and the split package descriptor model parsed from manifests.

pub mod core;
pub mod package;

pub use self::core::error::{FailureReason, InstallError, SplitError, SplitResult};
pub use self::core::error_help::{format_error_with_help, ErrorHelp};
pub use package::descriptor::{
    ArtifactDescriptor, LibDescriptor, LibSet, PackageDescriptor, SplitManifest, BUNDLE_SCHEME,
    MASTER_ARCH,
};
