//! On-disk layout of installed split packages.
//!
//! ```text
//! <base>/<app_id>/<store_id>/
//!     tmp/                                  scratch space for re-provisioning
//!     uninstall/pending.yaml                deferred uninstall requests
//!     <name>/.<version>.lock                install lock, outlives the version
//!     <name>/<version>/
//!         <name>-<arch>.pkg
//!         <fingerprint>.mark                installed marker
//!         oat/                              generated code
//!         lib/<arch>/                       extracted native libraries
//!         code_cache/                       extracted secondary code segments
//! ```

pub mod lock;

pub use lock::DirLock;

use crate::core::path::{ensure_dir, validate_component};
use crate::core::{InstallError, SplitResult};
use splitpack_core::PackageDescriptor;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const MARKER_EXTENSION: &str = "mark";
pub const LOCK_EXTENSION: &str = "lock";

const TMP_DIR: &str = "tmp";
const UNINSTALL_DIR: &str = "uninstall";
const GENERATED_DIR: &str = "oat";
const LIB_DIR: &str = "lib";
const CODE_CACHE_DIR: &str = "code_cache";
const PACKAGE_EXTENSION: &str = "pkg";

/// Store root for one application identity
#[derive(Debug, Clone)]
pub struct PackageStore {
    base: PathBuf,
    store_id: String,
    root: PathBuf,
}

impl PackageStore {
    pub fn new(base: PathBuf, store_id: &str) -> SplitResult<Self> {
        validate_component("store id", store_id)?;
        let root = base.join(store_id);
        ensure_dir(&root)?;
        Ok(Self {
            base,
            store_id: store_id.to_string(),
            root,
        })
    }

    /// Store root `<base>/<app_id>/<store_id>`.
    ///
    /// Roots of one application are siblings; other applications sharing
    /// `base` live under their own directory.
    pub fn for_app(base: &Path, app_id: &str, store_id: &str) -> SplitResult<Self> {
        validate_component("app id", app_id)?;
        Self::new(base.join(app_id), store_id)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join(TMP_DIR)
    }

    pub fn uninstall_dir(&self) -> PathBuf {
        self.root.join(UNINSTALL_DIR)
    }

    pub fn package_root(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn version_dir(&self, descriptor: &PackageDescriptor) -> PathBuf {
        self.package_root(&descriptor.name).join(&descriptor.version)
    }

    pub fn ensure_version_dir(&self, descriptor: &PackageDescriptor) -> SplitResult<PathBuf> {
        let dir = self.version_dir(descriptor);
        ensure_dir(&dir)?;
        Ok(dir)
    }

    /// Where the verified bytes of one artifact live
    pub fn artifact_path(&self, descriptor: &PackageDescriptor, arch: &str) -> PathBuf {
        self.version_dir(descriptor).join(format!(
            "{}-{}.{}",
            descriptor.name, arch, PACKAGE_EXTENSION
        ))
    }

    pub fn generated_dir(&self, descriptor: &PackageDescriptor) -> PathBuf {
        self.version_dir(descriptor).join(GENERATED_DIR)
    }

    pub fn lib_dir(&self, descriptor: &PackageDescriptor, arch: &str) -> PathBuf {
        self.version_dir(descriptor).join(LIB_DIR).join(arch)
    }

    pub fn code_cache_dir(&self, descriptor: &PackageDescriptor) -> PathBuf {
        self.version_dir(descriptor).join(CODE_CACHE_DIR)
    }

    pub fn lock_path(&self, descriptor: &PackageDescriptor) -> PathBuf {
        version_lock_path(&self.version_dir(descriptor))
    }

    /// Identity of one exact build of a package.
    ///
    /// Two descriptors with the same name and version but different artifact
    /// hashes get different markers, so a rebuilt package is never mistaken
    /// for the one installed before it.
    pub fn installed_fingerprint(descriptor: &PackageDescriptor) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(descriptor.name.as_bytes());
        hasher.update(&[0]);
        hasher.update(descriptor.version.as_bytes());
        hasher.update(&[0]);

        let mut artifacts: Vec<_> = descriptor.artifacts.iter().collect();
        artifacts.sort_by(|a, b| a.arch.cmp(&b.arch));
        for artifact in artifacts {
            hasher.update(artifact.arch.as_bytes());
            hasher.update(&[0]);
            hasher.update(artifact.hash.as_bytes());
            hasher.update(&[0]);
        }

        hex::encode(&hasher.finalize().as_bytes()[..16])
    }

    pub fn marker_path(&self, descriptor: &PackageDescriptor) -> PathBuf {
        self.version_dir(descriptor).join(format!(
            "{}.{}",
            Self::installed_fingerprint(descriptor),
            MARKER_EXTENSION
        ))
    }

    pub fn is_installed(&self, descriptor: &PackageDescriptor) -> bool {
        self.marker_path(descriptor).is_file()
    }

    /// Create the installed marker.
    ///
    /// Returns `true` for the one caller that actually created it and
    /// `false` when it already existed. The version directory must exist;
    /// it is never recreated here.
    pub fn create_marker(&self, descriptor: &PackageDescriptor) -> Result<bool, InstallError> {
        let path = self.marker_path(descriptor);
        let mark_failed = |source: io::Error| InstallError::MarkCreateFailed {
            path: path.clone(),
            source,
        };

        let version_dir = self.version_dir(descriptor);
        if !version_dir.is_dir() {
            return Err(mark_failed(io::Error::new(
                io::ErrorKind::NotFound,
                format!("version directory {} is gone", version_dir.display()),
            )));
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                file.sync_all().map_err(mark_failed)?;
                debug!(marker = %path.display(), "created installed marker");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(mark_failed(e)),
        }
    }

    /// Remove every installed marker of a package across all its versions
    pub fn remove_markers(&self, name: &str) -> SplitResult<usize> {
        let mut removed = 0;
        for dir in self.version_dirs(name)? {
            for marker in markers_in(&dir)? {
                fs::remove_file(&marker)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// All version directories present for a package, in no particular order
    pub fn version_dirs(&self, name: &str) -> SplitResult<Vec<PathBuf>> {
        let package_root = self.package_root(name);
        if !package_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in fs::read_dir(&package_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }

    /// Names of every package that has a directory in this store root
    pub fn package_names(&self) -> SplitResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name != TMP_DIR && name != UNINSTALL_DIR {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn remove_version_dir(&self, descriptor: &PackageDescriptor) -> SplitResult<()> {
        let dir = self.version_dir(descriptor);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            info!(dir = %dir.display(), "removed package version directory");
        }
        Ok(())
    }

    /// Delete store roots left behind by earlier configurations of this
    /// application and scratch files older than `max_age`.
    ///
    /// Only siblings under the same `<base>/<app_id>` are considered.
    ///
    /// Failures are logged and skipped.
    pub fn clear_stale_roots(&self, max_age: Duration) -> SplitResult<EvictionResult> {
        let mut result = EvictionResult::default();

        if self.base.is_dir() {
            for entry in fs::read_dir(&self.base)? {
                let entry = entry?;
                let path = entry.path();
                if !entry.file_type()?.is_dir() || entry.file_name() == self.store_id.as_str() {
                    continue;
                }

                let bytes = dir_size(&path);
                match fs::remove_dir_all(&path) {
                    Ok(()) => {
                        info!(root = %path.display(), "removed stale store root");
                        result.roots_removed += 1;
                        result.bytes_freed += bytes;
                    }
                    Err(e) => {
                        warn!(root = %path.display(), error = %e, "failed to remove stale store root");
                    }
                }
            }
        }

        result += self.clean_tmp(max_age)?;
        Ok(result)
    }

    fn clean_tmp(&self, max_age: Duration) -> SplitResult<EvictionResult> {
        let tmp = self.tmp_dir();
        let mut result = EvictionResult::default();
        if !tmp.is_dir() {
            return Ok(result);
        }

        let now = SystemTime::now();
        for entry in WalkDir::new(&tmp).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let expired = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .map(|age| age > max_age)
                .unwrap_or(false);
            if !expired {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    result.files_removed += 1;
                    result.bytes_freed += metadata.len();
                }
                Err(e) => {
                    warn!(file = %entry.path().display(), error = %e, "failed to remove scratch file");
                }
            }
        }
        Ok(result)
    }
}

/// Install lock of a version directory: `<name>/.<version>.lock`.
///
/// It sits next to the version directory so deleting the version never
/// unlinks a lock somebody may be waiting on.
pub fn version_lock_path(version_dir: &Path) -> PathBuf {
    let version = version_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    version_dir.with_file_name(format!(".{}.{}", version, LOCK_EXTENSION))
}

/// Whether a directory holds at least one installed marker
pub fn has_marker(dir: &Path) -> bool {
    markers_in(dir).map(|m| !m.is_empty()).unwrap_or(false)
}

fn markers_in(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut markers = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(MARKER_EXTENSION) {
            markers.push(path);
        }
    }
    Ok(markers)
}

fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Write a file so readers see either the old content or the new, never a mix
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::other(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, std::process::id()));

    let mut file = fs::File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

/// Result of evicting stale store data
#[derive(Debug, Default)]
pub struct EvictionResult {
    pub roots_removed: usize,
    pub files_removed: usize,
    pub bytes_freed: u64,
}

impl std::ops::AddAssign for EvictionResult {
    fn add_assign(&mut self, other: Self) {
        self.roots_removed += other.roots_removed;
        self.files_removed += other.files_removed;
        self.bytes_freed += other.bytes_freed;
    }
}
