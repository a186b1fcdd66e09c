//! Trait definitions for dependency injection

use crate::core::SplitResult;
use crate::resolver::ActivationRecord;
use crate::runtime::{GeneratedCodeStatus, RuntimeProfile};
use async_trait::async_trait;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Trait for configuration access
///
/// Provides read-only access to application configuration.
/// Implementations should be thread-safe (Send + Sync).
pub trait ConfigProvider: Send + Sync {
    /// Directory holding one `<app_id>/` directory of store roots per application
    fn store_base(&self) -> SplitResult<PathBuf>;

    /// Store id used when the manifest does not name one
    fn store_id(&self) -> &str;

    /// Application id; the main process carries this name
    fn app_id(&self) -> &str;

    /// Check whether package signatures must be verified
    fn verify_signature(&self) -> bool;

    fn trusted_signer(&self) -> Option<&str>;

    /// Get the checksum algorithm (e.g., "blake3", "sha256")
    fn checksum_algorithm(&self) -> &str;

    /// How many older installed versions the sweeper keeps
    fn retained_versions(&self) -> usize;

    /// Age after which unmarked version directories count as abandoned
    fn orphan_max_age(&self) -> Duration;

    fn runtime_profile(&self) -> RuntimeProfile;

    /// Directory holding packages shipped with the host
    fn bundle_dir(&self) -> Option<PathBuf>;

    /// Whether generated code is validated after extraction
    fn check_generated_code(&self) -> bool;
}

/// Decides whether a package file carries a trusted signature
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, package: &Path) -> bool;
}

/// Read access to the packages shipped inside the host bundle
pub trait BundledSource: Send + Sync {
    fn open(&self, package: &str, arch: &str) -> io::Result<Box<dyn Read + Send>>;
}

/// Platform-specific inspection of generated code
pub trait GeneratedCodeValidator: Send + Sync {
    fn check(&self, generated_dir: &Path, primary: &Path) -> GeneratedCodeStatus;
}

/// Loads installed packages into the running host
///
/// `load` makes the package's code and resources reachable; `activate`
/// runs its entry point once every package of the plan is loaded.
#[async_trait]
pub trait PackageLoader: Send + Sync {
    async fn load(&self, record: &ActivationRecord) -> SplitResult<()>;

    async fn activate(&self, name: &str) -> SplitResult<()>;
}
