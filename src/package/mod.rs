pub mod checksum;
pub mod extraction;
pub mod extractor;
pub mod installer;
pub mod provision;
pub mod service;
pub mod uninstall;
pub mod verifier;

pub use checksum::ChecksumAlgorithm;
pub use extraction::ExtractionManifest;
pub use extractor::PackageExtractor;
pub use installer::{InstallCoordinator, InstallOutcome, InstallReport, InstallState};
pub use provision::{DirectoryBundle, NoBundle, Reprovisioner};
pub use service::InstallService;
pub use uninstall::{PendingUninstall, Uninstaller};
pub use verifier::{ArchiveSignatureVerifier, IntegrityVerifier, Verified};
