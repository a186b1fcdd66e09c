use crate::core::InstallError;
use crate::package::checksum::{checksum_with_algorithm, checksums_match, ChecksumAlgorithm};
use crate::package::extraction::ExtractionManifest;
use crate::runtime::RuntimeProfile;
use crate::store::DirLock;
use splitpack_core::{LibSet, PackageDescriptor};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

const EXTRACT_LOCK: &str = ".extract.lock";
const PARTIAL_SUFFIX: &str = ".partial";

/// Name of the code segment the runtime reads straight from the package
pub const PRIMARY_SEGMENT: &str = "code.bin";

/// Segment number of a `code<N>.bin` entry, for N >= 2
fn secondary_segment_number(entry_name: &str) -> Option<u32> {
    let digits = entry_name.strip_prefix("code")?.strip_suffix(".bin")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|n| *n >= 2)
}

/// Fails with `UnsupportedRuntime` when the runtime cannot load every code
/// segment of the package by itself.
pub fn check_segment_support(
    descriptor: &PackageDescriptor,
    runtime: &RuntimeProfile,
) -> Result<(), InstallError> {
    if descriptor.segments > 1 && !runtime.multi_segment_capable {
        return Err(InstallError::UnsupportedRuntime(format!(
            "'{}' has {} code segments but the runtime loads only one",
            descriptor.name, descriptor.segments
        )));
    }
    Ok(())
}

/// Key an extraction record is tied to; a new app or package version invalidates it
pub fn extraction_key(descriptor: &PackageDescriptor) -> String {
    format!(
        "{}@{}@{}",
        descriptor.name, descriptor.app_version, descriptor.version
    )
}

/// Extracts package entries into one target directory.
///
/// Holds the target's lock for the whole extraction. Entries are written
/// under a temporary name and renamed into place once complete.
pub struct PackageExtractor {
    target_dir: PathBuf,
}

impl PackageExtractor {
    /// Create a new PackageExtractor
    pub fn new(target_dir: PathBuf) -> Self {
        Self { target_dir }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Extract the native libraries of `libs` from `package`.
    ///
    /// Libraries already recorded with the same hash and still on disk are
    /// skipped. Returns the library paths in declaration order.
    pub fn extract_libs(
        &self,
        package: &Path,
        libs: &LibSet,
        key: &str,
    ) -> Result<Vec<PathBuf>, InstallError> {
        let _lock = self.prepare()?;
        let mut manifest = ExtractionManifest::load_for(&self.target_dir, key);

        let pending: Vec<_> = libs
            .libs
            .iter()
            .filter(|lib| !manifest.is_current(&self.target_dir, &lib.name, &lib.hash))
            .collect();

        if !pending.is_empty() {
            let mut archive = open_archive(package)?;
            for lib in pending {
                let entry_name = format!("lib/{}/{}", libs.arch, lib.name);
                let size = self.extract_entry(&mut archive, &entry_name, &lib.name, Some(&lib.hash))?;
                manifest.record(&lib.name, &lib.hash, size);
                manifest.save(&self.target_dir)?;
            }
        } else {
            debug!(dir = %self.target_dir.display(), "native libraries already extracted");
        }

        Ok(libs
            .libs
            .iter()
            .map(|lib| self.target_dir.join(&lib.name))
            .collect())
    }

    /// Extract the secondary code segments (`code2.bin`..) of `package`.
    ///
    /// Returns the segment paths ordered by segment number.
    pub fn extract_segments(&self, package: &Path, key: &str) -> Result<Vec<PathBuf>, InstallError> {
        let _lock = self.prepare()?;
        let mut manifest = ExtractionManifest::load_for(&self.target_dir, key);
        let mut archive = open_archive(package)?;

        let mut segments: Vec<(u32, String, String)> = Vec::new();
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(|e| extraction_failed(package, e))?;
            let Some(number) = secondary_segment_number(entry.name()) else {
                continue;
            };
            segments.push((
                number,
                entry.name().to_string(),
                format!("crc32:{:08x}", entry.crc32()),
            ));
        }
        segments.sort_by_key(|(number, _, _)| *number);

        let mut produced = Vec::with_capacity(segments.len());
        for (_, name, crc) in segments {
            if manifest.is_current(&self.target_dir, &name, &crc) {
                debug!(segment = %name, "segment already extracted");
            } else {
                let size = self.extract_entry(&mut archive, &name, &name, None)?;
                manifest.record(&name, &crc, size);
                manifest.save(&self.target_dir)?;
            }
            produced.push(self.target_dir.join(&name));
        }

        Ok(produced)
    }

    /// Create the target, take its lock and clear writes a dead holder left behind
    fn prepare(&self) -> Result<DirLock, InstallError> {
        fs::create_dir_all(&self.target_dir)?;
        let lock = DirLock::acquire(&self.target_dir.join(EXTRACT_LOCK))?;

        for entry in fs::read_dir(&self.target_dir)? {
            let path = entry?.path();
            let is_partial = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(PARTIAL_SUFFIX))
                .unwrap_or(false);
            if is_partial {
                debug!(file = %path.display(), "removing interrupted extraction");
                fs::remove_file(&path)?;
            }
        }

        Ok(lock)
    }

    /// Write one archive entry to `<target>/<out_name>` and return its size
    fn extract_entry(
        &self,
        archive: &mut ZipArchive<File>,
        entry_name: &str,
        out_name: &str,
        expected: Option<&str>,
    ) -> Result<u64, InstallError> {
        let partial = self
            .target_dir
            .join(format!("{}{}", out_name, PARTIAL_SUFFIX));
        let dest = self.target_dir.join(out_name);

        let written = {
            let mut entry = archive.by_name(entry_name).map_err(|e| {
                InstallError::ExtractionFailed(format!("{}: {}", entry_name, e))
            })?;
            write_file(&mut entry, &partial)
        };
        let size = match written {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&partial);
                return Err(InstallError::ExtractionFailed(format!(
                    "{}: {}",
                    entry_name, e
                )));
            }
        };

        if let Some(expected) = expected {
            let actual = checksum_with_algorithm(&partial, ChecksumAlgorithm::from_checksum(expected))
                .map_err(|e| {
                    let _ = fs::remove_file(&partial);
                    InstallError::ExtractionFailed(format!("{}: {}", entry_name, e))
                })?;
            if !checksums_match(expected, &actual) {
                let _ = fs::remove_file(&partial);
                return Err(InstallError::ExtractionFailed(format!(
                    "{}: checksum mismatch, expected {}, got {}",
                    entry_name, expected, actual
                )));
            }
        }

        fs::rename(&partial, &dest).inspect_err(|_| {
            let _ = fs::remove_file(&partial);
        })?;
        debug!(entry = %entry_name, file = %dest.display(), "extracted");
        Ok(size)
    }
}

fn open_archive(package: &Path) -> Result<ZipArchive<File>, InstallError> {
    let file = File::open(package).map_err(|e| extraction_failed(package, e))?;
    ZipArchive::new(file).map_err(|e| extraction_failed(package, e))
}

fn extraction_failed(package: &Path, err: impl std::fmt::Display) -> InstallError {
    InstallError::ExtractionFailed(format!("{}: {}", package.display(), err))
}

fn write_file(reader: &mut impl Read, path: &Path) -> io::Result<u64> {
    let mut out = File::create(path)?;
    let size = io::copy(reader, &mut out)?;
    out.sync_all()?;
    Ok(size)
}
