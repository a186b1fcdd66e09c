//! Restoring built-in packages from the host bundle.

use crate::core::InstallError;
use crate::di::BundledSource;
use crate::package::verifier::IntegrityVerifier;
use crate::store::PackageStore;
use splitpack_core::{ArtifactDescriptor, PackageDescriptor};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

pub const MAX_REPROVISION_ATTEMPTS: u32 = 3;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Reads `<root>/<name>-<arch>.pkg` for packages shipped with the host
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn package_path(&self, package: &str, arch: &str) -> PathBuf {
        self.root.join(format!("{}-{}.pkg", package, arch))
    }
}

impl BundledSource for DirectoryBundle {
    fn open(&self, package: &str, arch: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(self.package_path(package, arch))?))
    }
}

/// Used when the host ships no packages
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBundle;

impl BundledSource for NoBundle {
    fn open(&self, package: &str, arch: &str) -> io::Result<Box<dyn Read + Send>> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no bundled copy of {}-{}", package, arch),
        ))
    }
}

/// Removes a scratch file on every exit path unless it was moved into place
struct TempFile {
    path: PathBuf,
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Copies a bundled artifact into the store, verifying it before it becomes visible
pub struct Reprovisioner<'a> {
    store: &'a PackageStore,
    bundle: &'a dyn BundledSource,
    verifier: &'a IntegrityVerifier,
}

impl<'a> Reprovisioner<'a> {
    pub fn new(
        store: &'a PackageStore,
        bundle: &'a dyn BundledSource,
        verifier: &'a IntegrityVerifier,
    ) -> Self {
        Self {
            store,
            bundle,
            verifier,
        }
    }

    /// Replace `dest` with a verified bundled copy.
    ///
    /// Returns the number of attempts it took. After
    /// [`MAX_REPROVISION_ATTEMPTS`] failures the last error is returned.
    pub fn reprovision(
        &self,
        descriptor: &PackageDescriptor,
        artifact: &ArtifactDescriptor,
        dest: &Path,
        require_signature: bool,
    ) -> Result<u32, InstallError> {
        let mut last_error = None;

        for attempt in 1..=MAX_REPROVISION_ATTEMPTS {
            match self.attempt(descriptor, artifact, dest, require_signature) {
                Ok(()) => {
                    info!(
                        package = %descriptor.name,
                        arch = %artifact.arch,
                        attempt,
                        "restored package from bundle"
                    );
                    return Ok(attempt);
                }
                Err(e) => {
                    warn!(
                        package = %descriptor.name,
                        arch = %artifact.arch,
                        attempt,
                        error = %e,
                        "re-provisioning attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| InstallError::MissingOrEmpty {
            path: dest.to_path_buf(),
        }))
    }

    fn attempt(
        &self,
        descriptor: &PackageDescriptor,
        artifact: &ArtifactDescriptor,
        dest: &Path,
        require_signature: bool,
    ) -> Result<(), InstallError> {
        let tmp_dir = self.store.tmp_dir();
        fs::create_dir_all(&tmp_dir)?;

        let temp = TempFile {
            path: tmp_dir.join(format!(
                "{}-{}.{}.{}.pkg",
                descriptor.name,
                artifact.arch,
                std::process::id(),
                TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
            )),
        };

        {
            let mut source = self.bundle.open(&descriptor.name, &artifact.arch)?;
            let mut out = File::create(&temp.path)?;
            io::copy(&mut source, &mut out)?;
            out.sync_all()?;
        }

        self.verifier
            .verify(&temp.path, artifact, require_signature)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&temp.path, dest)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailureReason;
    use crate::di::mocks::{MockBundledSource, MockSignatureVerifier};
    use crate::test_support::{bundled, descriptor_for, TestPackage};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PackageStore, IntegrityVerifier) {
        let temp = TempDir::new().unwrap();
        let store = PackageStore::new(temp.path().join("store"), "app").unwrap();
        let verifier = IntegrityVerifier::new(Arc::new(MockSignatureVerifier::new(true)));
        (temp, store, verifier)
    }

    fn tmp_is_empty(store: &PackageStore) -> bool {
        fs::read_dir(store.tmp_dir()).unwrap().next().is_none()
    }

    #[test]
    fn test_reprovision_first_attempt() {
        let (_temp, store, verifier) = setup();
        let bytes = TestPackage::new().code(1).build();
        let d = bundled(descriptor_for("feature-a", "1", &bytes));
        let bundle = MockBundledSource::new();
        bundle.add("feature-a", "master", bytes.clone());

        let dest = store.artifact_path(&d, "master");
        let attempts = Reprovisioner::new(&store, &bundle, &verifier)
            .reprovision(&d, d.master_artifact().unwrap(), &dest, false)
            .unwrap();

        assert_eq!(attempts, 1);
        assert_eq!(bundle.opens(), 1);
        assert_eq!(fs::read(&dest).unwrap(), bytes);
        assert!(tmp_is_empty(&store));
    }

    #[test]
    fn test_reprovision_gives_up_after_three_attempts() {
        let (_temp, store, verifier) = setup();
        let bytes = TestPackage::new().code(1).build();
        let d = bundled(descriptor_for("feature-a", "1", &bytes));
        let bundle = MockBundledSource::new();
        let mut corrupted = bytes.clone();
        corrupted[3] ^= 0x55;
        bundle.add("feature-a", "master", corrupted);

        let dest = store.artifact_path(&d, "master");
        let err = Reprovisioner::new(&store, &bundle, &verifier)
            .reprovision(&d, d.master_artifact().unwrap(), &dest, false)
            .unwrap_err();

        assert_eq!(err.reason(), FailureReason::HashMismatch);
        assert_eq!(bundle.opens(), MAX_REPROVISION_ATTEMPTS);
        assert!(!dest.exists());
        assert!(tmp_is_empty(&store));
    }

    #[test]
    fn test_reprovision_missing_bundle_entry() {
        let (_temp, store, verifier) = setup();
        let d = bundled(descriptor_for("feature-a", "1", b"x"));

        let dest = store.artifact_path(&d, "master");
        let err = Reprovisioner::new(&store, &NoBundle, &verifier)
            .reprovision(&d, d.master_artifact().unwrap(), &dest, false)
            .unwrap_err();
        assert_eq!(err.reason(), FailureReason::InternalError);
    }

    #[test]
    fn test_directory_bundle() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a-master.pkg"), b"bytes").unwrap();
        let bundle = DirectoryBundle::new(temp.path().to_path_buf());

        let mut content = Vec::new();
        bundle
            .open("a", "master")
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, b"bytes");
        assert!(bundle.open("a", "arm64").is_err());
    }
}
