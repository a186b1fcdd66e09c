//! Mock implementations of service traits for testing

use super::traits::{
    BundledSource, ConfigProvider, GeneratedCodeValidator, PackageLoader, SignatureVerifier,
};
use crate::core::{SplitError, SplitResult};
use crate::resolver::ActivationRecord;
use crate::runtime::{GeneratedCodeStatus, RuntimeProfile};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock configuration provider for testing
///
/// # Example
///
/// ```
/// use splitpack::di::mocks::MockConfigProvider;
/// use splitpack::di::ConfigProvider;
/// use std::path::PathBuf;
///
/// let mut config = MockConfigProvider::default();
/// config.store_base = PathBuf::from("/tmp/test-store");
/// config.verify_signature = true;
///
/// assert!(config.verify_signature());
/// ```
#[derive(Clone)]
pub struct MockConfigProvider {
    pub store_base: PathBuf,
    pub store_id: String,
    pub app_id: String,
    pub verify_signature: bool,
    pub trusted_signer: Option<String>,
    pub checksum_algorithm: String,
    pub retained_versions: usize,
    pub orphan_max_age: Duration,
    pub runtime: RuntimeProfile,
    pub bundle_dir: Option<PathBuf>,
    pub check_generated_code: bool,
}

impl Default for MockConfigProvider {
    fn default() -> Self {
        Self {
            store_base: PathBuf::from("/tmp/splitpack-test-store"),
            store_id: "test".to_string(),
            app_id: "com.example.app".to_string(),
            verify_signature: false,
            trusted_signer: None,
            checksum_algorithm: "blake3".to_string(),
            retained_versions: 1,
            orphan_max_age: Duration::from_secs(7 * 24 * 60 * 60),
            runtime: RuntimeProfile::default(),
            bundle_dir: None,
            check_generated_code: false,
        }
    }
}

impl ConfigProvider for MockConfigProvider {
    fn store_base(&self) -> SplitResult<PathBuf> {
        Ok(self.store_base.clone())
    }

    fn store_id(&self) -> &str {
        &self.store_id
    }

    fn app_id(&self) -> &str {
        &self.app_id
    }

    fn verify_signature(&self) -> bool {
        self.verify_signature
    }

    fn trusted_signer(&self) -> Option<&str> {
        self.trusted_signer.as_deref()
    }

    fn checksum_algorithm(&self) -> &str {
        &self.checksum_algorithm
    }

    fn retained_versions(&self) -> usize {
        self.retained_versions
    }

    fn orphan_max_age(&self) -> Duration {
        self.orphan_max_age
    }

    fn runtime_profile(&self) -> RuntimeProfile {
        self.runtime.clone()
    }

    fn bundle_dir(&self) -> Option<PathBuf> {
        self.bundle_dir.clone()
    }

    fn check_generated_code(&self) -> bool {
        self.check_generated_code
    }
}

/// Signature verifier with a fixed answer
#[derive(Debug, Clone)]
pub struct MockSignatureVerifier {
    accept: bool,
}

impl MockSignatureVerifier {
    pub fn new(accept: bool) -> Self {
        Self { accept }
    }
}

impl SignatureVerifier for MockSignatureVerifier {
    fn verify(&self, _package: &Path) -> bool {
        self.accept
    }
}

/// In-memory bundle that counts how often it was read
///
/// # Example
///
/// ```
/// use splitpack::di::mocks::MockBundledSource;
/// use splitpack::di::BundledSource;
///
/// let bundle = MockBundledSource::new();
/// bundle.add("feature-a", "master", b"bytes".to_vec());
///
/// assert!(bundle.open("feature-a", "master").is_ok());
/// assert!(bundle.open("feature-b", "master").is_err());
/// assert_eq!(bundle.opens(), 2);
/// ```
#[derive(Clone, Default)]
pub struct MockBundledSource {
    files: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
    opens: Arc<AtomicU32>,
}

impl MockBundledSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, package: &str, arch: &str, data: Vec<u8>) {
        self.files
            .lock()
            .unwrap()
            .insert((package.to_string(), arch.to_string()), data);
    }

    /// Number of `open` calls so far
    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }
}

impl BundledSource for MockBundledSource {
    fn open(&self, package: &str, arch: &str) -> io::Result<Box<dyn Read + Send>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let files = self.files.lock().unwrap();
        match files.get(&(package.to_string(), arch.to_string())) {
            Some(data) => Ok(Box::new(Cursor::new(data.clone()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}-{} not bundled", package, arch),
            )),
        }
    }
}

/// Generated code validator with a fixed answer
#[derive(Debug, Clone)]
pub struct MockGeneratedCodeValidator {
    status: GeneratedCodeStatus,
}

impl MockGeneratedCodeValidator {
    pub fn new(status: GeneratedCodeStatus) -> Self {
        Self { status }
    }
}

impl GeneratedCodeValidator for MockGeneratedCodeValidator {
    fn check(&self, _generated_dir: &Path, _primary: &Path) -> GeneratedCodeStatus {
        self.status.clone()
    }
}

/// Loader that records calls and fails for chosen packages
#[derive(Clone, Default)]
pub struct MockPackageLoader {
    loaded: Arc<Mutex<Vec<String>>>,
    activated: Arc<Mutex<Vec<String>>>,
    fail_load: HashSet<String>,
    fail_activate: HashSet<String>,
}

impl MockPackageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_load(mut self, name: &str) -> Self {
        self.fail_load.insert(name.to_string());
        self
    }

    pub fn failing_activate(mut self, name: &str) -> Self {
        self.fail_activate.insert(name.to_string());
        self
    }

    pub fn loaded(&self) -> Vec<String> {
        self.loaded.lock().unwrap().clone()
    }

    pub fn activated(&self) -> Vec<String> {
        self.activated.lock().unwrap().clone()
    }
}

#[async_trait]
impl PackageLoader for MockPackageLoader {
    async fn load(&self, record: &ActivationRecord) -> SplitResult<()> {
        if self.fail_load.contains(&record.name) {
            return Err(SplitError::Package(format!(
                "Mock load failure for '{}'",
                record.name
            )));
        }
        self.loaded.lock().unwrap().push(record.name.clone());
        Ok(())
    }

    async fn activate(&self, name: &str) -> SplitResult<()> {
        if self.fail_activate.contains(name) {
            return Err(SplitError::Package(format!(
                "Mock activation failure for '{}'",
                name
            )));
        }
        self.activated.lock().unwrap().push(name.to_string());
        Ok(())
    }
}
