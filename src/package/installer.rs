use crate::core::{FailureReason, InstallError};
use crate::di::{BundledSource, SignatureVerifier};
use crate::package::extractor::{check_segment_support, extraction_key, PackageExtractor};
use crate::package::provision::Reprovisioner;
use crate::package::verifier::IntegrityVerifier;
use crate::runtime::{GeneratedCodeStatus, PostExtractVerifier, RuntimeProfile};
use crate::store::{DirLock, PackageStore};
use splitpack_core::MASTER_ARCH;
use splitpack_core::{ArtifactDescriptor, PackageDescriptor};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a single install currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Requested,
    Verifying,
    Extracting,
    MarkingInstalled,
    Installed,
    Failed(FailureReason),
}

impl InstallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstallState::Installed | InstallState::Failed(_))
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallState::Requested => f.write_str("requested"),
            InstallState::Verifying => f.write_str("verifying"),
            InstallState::Extracting => f.write_str("extracting"),
            InstallState::MarkingInstalled => f.write_str("marking-installed"),
            InstallState::Installed => f.write_str("installed"),
            InstallState::Failed(reason) => write!(f, "failed({})", reason),
        }
    }
}

/// Everything the loader needs from a finished install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub name: String,
    pub version: String,
    pub primary_artifact: PathBuf,
    pub generated_dir: Option<PathBuf>,
    pub lib_dir: Option<PathBuf>,
    /// Primary segment first, then extracted secondary segments in order
    pub segments: Vec<PathBuf>,
    /// Whether this call created the installed marker
    pub first_installed: bool,
    /// Generated code is missing or was discarded; the runtime must interpret
    pub fallback_mode: bool,
    /// Bundle copies made to repair the package, zero when none were needed
    pub reprovision_attempts: u32,
}

/// The full history of one install call
#[derive(Debug)]
pub struct InstallReport {
    pub name: String,
    pub version: String,
    pub transitions: Vec<InstallState>,
    pub result: Result<InstallOutcome, InstallError>,
}

impl InstallReport {
    pub fn state(&self) -> InstallState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(InstallState::Requested)
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

struct Transitions<'a> {
    descriptor: &'a PackageDescriptor,
    states: Vec<InstallState>,
}

impl<'a> Transitions<'a> {
    fn new(descriptor: &'a PackageDescriptor) -> Self {
        let mut transitions = Self {
            descriptor,
            states: Vec::with_capacity(5),
        };
        transitions.enter(InstallState::Requested);
        transitions
    }

    fn enter(&mut self, state: InstallState) {
        debug!(
            package = %self.descriptor.name,
            version = %self.descriptor.version,
            state = %state,
            "install state"
        );
        self.states.push(state);
    }
}

struct Extracted {
    generated_dir: Option<PathBuf>,
    lib_dir: Option<PathBuf>,
    segments: Vec<PathBuf>,
    fallback_mode: bool,
}

/// Drives one package version from "bytes on disk" to "installed".
///
/// The coordinator only reads artifacts that are already in the store (or
/// restores built-in ones from the bundle); it never downloads.
pub struct InstallCoordinator {
    store: PackageStore,
    verifier: IntegrityVerifier,
    bundle: Arc<dyn BundledSource>,
    runtime: RuntimeProfile,
    post_extract: PostExtractVerifier,
}

impl InstallCoordinator {
    pub fn new(
        store: PackageStore,
        signature: Arc<dyn SignatureVerifier>,
        bundle: Arc<dyn BundledSource>,
        runtime: RuntimeProfile,
        post_extract: PostExtractVerifier,
    ) -> Self {
        Self {
            store,
            verifier: IntegrityVerifier::new(signature),
            bundle,
            runtime,
            post_extract,
        }
    }

    pub fn store(&self) -> &PackageStore {
        &self.store
    }

    pub fn runtime(&self) -> &RuntimeProfile {
        &self.runtime
    }

    pub fn install(
        &self,
        descriptor: &PackageDescriptor,
        verify_signature: bool,
    ) -> Result<InstallOutcome, InstallError> {
        self.install_tracked(descriptor, verify_signature).result
    }

    /// Install and keep every state the package went through
    pub fn install_tracked(
        &self,
        descriptor: &PackageDescriptor,
        verify_signature: bool,
    ) -> InstallReport {
        let mut transitions = Transitions::new(descriptor);
        let result = self.run(descriptor, verify_signature, &mut transitions);

        match &result {
            Ok(outcome) => {
                transitions.enter(InstallState::Installed);
                info!(
                    package = %descriptor.name,
                    version = %descriptor.version,
                    first_installed = outcome.first_installed,
                    fallback_mode = outcome.fallback_mode,
                    "package installed"
                );
            }
            Err(e) => {
                transitions.enter(InstallState::Failed(e.reason()));
                warn!(
                    package = %descriptor.name,
                    version = %descriptor.version,
                    reason = %e.reason(),
                    error = %e,
                    "install failed"
                );
            }
        }

        InstallReport {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            transitions: transitions.states,
            result,
        }
    }

    fn run(
        &self,
        descriptor: &PackageDescriptor,
        verify_signature: bool,
        transitions: &mut Transitions<'_>,
    ) -> Result<InstallOutcome, InstallError> {
        descriptor.validate()?;

        if !self.runtime.supports_platform(descriptor.min_platform) {
            return Err(InstallError::UnsupportedRuntime(format!(
                "'{}' requires platform level {}",
                descriptor.name, descriptor.min_platform
            )));
        }

        // Held until the marker is written so no sweeper sees a half-built version
        let _lock = DirLock::acquire(&self.store.lock_path(descriptor))?;
        self.store.ensure_version_dir(descriptor)?;

        transitions.enter(InstallState::Verifying);
        let reprovision_attempts = self.verify_artifacts(descriptor, verify_signature)?;

        transitions.enter(InstallState::Extracting);
        let extracted = self.extract(descriptor)?;

        transitions.enter(InstallState::MarkingInstalled);
        let first_installed = self.store.create_marker(descriptor)?;

        Ok(InstallOutcome {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            primary_artifact: self.store.artifact_path(descriptor, MASTER_ARCH),
            generated_dir: extracted.generated_dir,
            lib_dir: extracted.lib_dir,
            segments: extracted.segments,
            first_installed,
            fallback_mode: extracted.fallback_mode,
            reprovision_attempts,
        })
    }

    /// The master artifact plus the artifact of the selected native arch
    fn required_artifacts<'d>(&self, descriptor: &'d PackageDescriptor) -> Vec<&'d ArtifactDescriptor> {
        let mut artifacts: Vec<_> = descriptor.master_artifact().into_iter().collect();
        if let Some(libs) = descriptor.select_libs(&self.runtime.supported_archs) {
            if let Some(artifact) = descriptor.artifact_for(&libs.arch) {
                if !artifact.is_master() {
                    artifacts.push(artifact);
                }
            }
        }
        artifacts
    }

    fn verify_artifacts(
        &self,
        descriptor: &PackageDescriptor,
        require_signature: bool,
    ) -> Result<u32, InstallError> {
        let mut attempts = 0;
        for artifact in self.required_artifacts(descriptor) {
            if let Err(e) = self.verify_artifact(descriptor, artifact, require_signature, &mut attempts) {
                self.discard_version(descriptor);
                return Err(e);
            }
        }
        Ok(attempts)
    }

    fn verify_artifact(
        &self,
        descriptor: &PackageDescriptor,
        artifact: &ArtifactDescriptor,
        require_signature: bool,
        attempts: &mut u32,
    ) -> Result<(), InstallError> {
        let path = self.store.artifact_path(descriptor, &artifact.arch);
        match self.verifier.verify(&path, artifact, require_signature) {
            Ok(verified) => {
                if verified.size_only() {
                    warn!(
                        package = %descriptor.name,
                        arch = %artifact.arch,
                        "package accepted on size alone"
                    );
                }
                Ok(())
            }
            Err(e) if descriptor.built_in && artifact.is_bundled() && e.is_integrity_failure() => {
                info!(
                    package = %descriptor.name,
                    arch = %artifact.arch,
                    reason = %e.reason(),
                    "restoring built-in package from bundle"
                );
                *attempts += Reprovisioner::new(&self.store, self.bundle.as_ref(), &self.verifier)
                    .reprovision(descriptor, artifact, &path, require_signature)?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a version that failed verification so the next attempt starts clean
    fn discard_version(&self, descriptor: &PackageDescriptor) {
        if let Err(e) = self.store.remove_version_dir(descriptor) {
            warn!(
                package = %descriptor.name,
                version = %descriptor.version,
                error = %e,
                "failed to remove corrupted package version"
            );
        }
    }

    fn extract(&self, descriptor: &PackageDescriptor) -> Result<Extracted, InstallError> {
        let primary = self.store.artifact_path(descriptor, MASTER_ARCH);
        let key = extraction_key(descriptor);

        let mut lib_dir = None;
        if let Some(libs) = descriptor.select_libs(&self.runtime.supported_archs) {
            let source = match descriptor.artifact_for(&libs.arch) {
                Some(artifact) => self.store.artifact_path(descriptor, &artifact.arch),
                None => primary.clone(),
            };
            let dir = self.store.lib_dir(descriptor, &libs.arch);
            PackageExtractor::new(dir.clone()).extract_libs(&source, libs, &key)?;
            lib_dir = Some(dir);
        }

        let mut extracted = Extracted {
            generated_dir: None,
            lib_dir,
            segments: Vec::new(),
            fallback_mode: false,
        };
        if !descriptor.has_code() {
            return Ok(extracted);
        }

        extracted.segments.push(primary.clone());
        if let Err(e) = check_segment_support(descriptor, &self.runtime) {
            debug!(package = %descriptor.name, reason = %e, "extracting secondary code segments");
            let cache = PackageExtractor::new(self.store.code_cache_dir(descriptor));
            extracted
                .segments
                .extend(cache.extract_segments(&primary, &key)?);
        }

        let generated_dir = self.store.generated_dir(descriptor);
        fs::create_dir_all(&generated_dir)?;
        extracted.fallback_mode = self.check_generated_code(descriptor, &generated_dir, &primary)?;
        extracted.generated_dir = Some(generated_dir);

        Ok(extracted)
    }

    /// Returns whether the package must run in fallback mode
    fn check_generated_code(
        &self,
        descriptor: &PackageDescriptor,
        generated_dir: &Path,
        primary: &Path,
    ) -> Result<bool, InstallError> {
        match self.post_extract.check(generated_dir, primary) {
            GeneratedCodeStatus::Usable => Ok(false),
            GeneratedCodeStatus::NotGenerated => {
                debug!(package = %descriptor.name, "no generated code yet");
                Ok(true)
            }
            GeneratedCodeStatus::Corrupt(path) => {
                warn!(
                    package = %descriptor.name,
                    path = %path.display(),
                    "discarding corrupt generated code"
                );
                if let Err(e) = remove_path(&path) {
                    warn!(path = %path.display(), error = %e, "failed to remove generated code");
                }
                if self.runtime.allow_fallback_mode {
                    Ok(true)
                } else {
                    Err(InstallError::GeneratedArtifactInvalid { path })
                }
            }
        }
    }
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else if path.exists() {
        fs::remove_file(path)
    } else {
        Ok(())
    }
}
