use crate::core::InstallError;
use crate::di::SignatureVerifier;
use crate::package::checksum::{checksum_with_algorithm, checksums_match, ChecksumAlgorithm};
use splitpack_core::ArtifactDescriptor;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Smallest possible package archive (an empty zip's end-of-directory record)
pub const MIN_PACKAGE_LEN: u64 = 22;

/// Archive entry holding the signer fingerprint
pub const SIGNER_ENTRY: &str = "META/signer";

/// Outcome of a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    /// Computed content hash, absent when only the size could be checked
    pub checksum: Option<String>,
    pub size: u64,
}

impl Verified {
    pub fn size_only(&self) -> bool {
        self.checksum.is_none()
    }
}

/// Decides whether the bytes on disk are the bytes a descriptor promised
#[derive(Clone)]
pub struct IntegrityVerifier {
    signature: Arc<dyn SignatureVerifier>,
}

impl IntegrityVerifier {
    pub fn new(signature: Arc<dyn SignatureVerifier>) -> Self {
        Self { signature }
    }

    /// Check presence, signature (when required) and content hash.
    ///
    /// When the hash cannot be computed the declared size is used instead.
    pub fn verify(
        &self,
        path: &Path,
        artifact: &ArtifactDescriptor,
        require_signature: bool,
    ) -> Result<Verified, InstallError> {
        let len = match fs::metadata(path) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                return Err(InstallError::MissingOrEmpty {
                    path: path.to_path_buf(),
                })
            }
        };
        if len < MIN_PACKAGE_LEN {
            return Err(InstallError::MissingOrEmpty {
                path: path.to_path_buf(),
            });
        }

        if require_signature && !self.signature.verify(path) {
            return Err(InstallError::SignatureMismatch {
                path: path.to_path_buf(),
            });
        }

        let algorithm = ChecksumAlgorithm::from_checksum(&artifact.hash);
        match checksum_with_algorithm(path, algorithm) {
            Ok(actual) if checksums_match(&artifact.hash, &actual) => {
                debug!(package = %path.display(), "checksum verified");
                Ok(Verified {
                    checksum: Some(actual),
                    size: len,
                })
            }
            Ok(actual) => Err(InstallError::HashMismatch {
                path: path.to_path_buf(),
                expected: artifact.hash.clone(),
                actual,
            }),
            Err(e) => {
                warn!(
                    package = %path.display(),
                    error = %e,
                    "could not hash package, falling back to size check"
                );
                if len == artifact.size {
                    Ok(Verified {
                        checksum: None,
                        size: len,
                    })
                } else {
                    Err(InstallError::SizeMismatch {
                        path: path.to_path_buf(),
                        expected: artifact.size,
                        actual: len,
                    })
                }
            }
        }
    }
}

/// Accepts packages whose embedded signer matches the trusted fingerprint
#[derive(Debug, Clone, Default)]
pub struct ArchiveSignatureVerifier {
    trusted: Option<String>,
}

impl ArchiveSignatureVerifier {
    pub fn new(trusted: Option<String>) -> Self {
        Self { trusted }
    }

    fn read_signer(path: &Path) -> zip::result::ZipResult<String> {
        let mut archive = zip::ZipArchive::new(File::open(path)?)?;
        let mut entry = archive.by_name(SIGNER_ENTRY)?;
        let mut signer = String::new();
        entry.read_to_string(&mut signer)?;
        Ok(signer.trim().to_string())
    }
}

impl SignatureVerifier for ArchiveSignatureVerifier {
    fn verify(&self, package: &Path) -> bool {
        let Some(trusted) = self.trusted.as_deref() else {
            warn!("signature verification requested but no trusted signer is configured");
            return false;
        };
        match Self::read_signer(package) {
            Ok(signer) => signer.eq_ignore_ascii_case(trusted.trim()),
            Err(e) => {
                warn!(package = %package.display(), error = %e, "could not read package signer");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailureReason;
    use crate::di::mocks::MockSignatureVerifier;
    use crate::test_support::{descriptor_for, TestPackage};
    use tempfile::TempDir;

    fn verifier(accept: bool) -> IntegrityVerifier {
        IntegrityVerifier::new(Arc::new(MockSignatureVerifier::new(accept)))
    }

    #[test]
    fn test_verify_valid_package() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.pkg");
        let bytes = TestPackage::new().code(1).write_to(&path);
        let d = descriptor_for("a", "1", &bytes);

        let verified = verifier(true)
            .verify(&path, d.master_artifact().unwrap(), true)
            .unwrap();
        assert_eq!(verified.size, bytes.len() as u64);
        assert!(!verified.size_only());
    }

    #[test]
    fn test_verify_missing_and_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.pkg");
        let d = descriptor_for("a", "1", b"whatever");
        let artifact = d.master_artifact().unwrap();

        let err = verifier(true).verify(&path, artifact, false).unwrap_err();
        assert_eq!(err.reason(), FailureReason::MissingOrEmpty);

        fs::write(&path, b"").unwrap();
        let err = verifier(true).verify(&path, artifact, false).unwrap_err();
        assert_eq!(err.reason(), FailureReason::MissingOrEmpty);

        fs::write(&path, b"tiny").unwrap();
        let err = verifier(true).verify(&path, artifact, false).unwrap_err();
        assert_eq!(err.reason(), FailureReason::MissingOrEmpty);
    }

    #[test]
    fn test_verify_hash_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.pkg");
        let bytes = TestPackage::new().code(1).write_to(&path);
        let d = descriptor_for("a", "1", &bytes);

        let mut corrupted = bytes.clone();
        corrupted[0] ^= 0xff;
        fs::write(&path, &corrupted).unwrap();

        let err = verifier(true)
            .verify(&path, d.master_artifact().unwrap(), false)
            .unwrap_err();
        assert!(matches!(err, InstallError::HashMismatch { .. }));
    }

    #[test]
    fn test_signature_only_checked_when_required() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.pkg");
        let bytes = TestPackage::new().code(1).write_to(&path);
        let d = descriptor_for("a", "1", &bytes);
        let artifact = d.master_artifact().unwrap();

        assert!(verifier(false).verify(&path, artifact, false).is_ok());
        let err = verifier(false).verify(&path, artifact, true).unwrap_err();
        assert_eq!(err.reason(), FailureReason::SignatureMismatch);
    }

    #[test]
    fn test_sha256_descriptor_hash() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.pkg");
        TestPackage::new().code(1).write_to(&path);

        let mut d = descriptor_for("a", "1", b"");
        d.artifacts[0].hash = checksum_with_algorithm(&path, ChecksumAlgorithm::Sha256).unwrap();
        assert!(verifier(true)
            .verify(&path, d.master_artifact().unwrap(), false)
            .is_ok());
    }

    #[test]
    fn test_archive_signature_verifier() {
        let temp = TempDir::new().unwrap();
        let signed = temp.path().join("signed.pkg");
        let unsigned = temp.path().join("unsigned.pkg");
        TestPackage::new().code(1).signer("AB:CD").write_to(&signed);
        TestPackage::new().code(1).write_to(&unsigned);

        let trusted = ArchiveSignatureVerifier::new(Some("ab:cd".to_string()));
        assert!(trusted.verify(&signed));
        assert!(!trusted.verify(&unsigned));

        let other = ArchiveSignatureVerifier::new(Some("ff:ff".to_string()));
        assert!(!other.verify(&signed));

        assert!(!ArchiveSignatureVerifier::default().verify(&signed));
    }
}
