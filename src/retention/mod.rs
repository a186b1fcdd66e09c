//! Reclaims superseded package versions.
//!
//! Only directories that carry an installed marker are eligible for normal
//! retention. Version directories that never got a marker are orphans and
//! are reclaimed once they are old enough. Either way a directory is only
//! deleted while the sweeper holds its install lock, so a version that is
//! being installed is never touched.

use crate::store::{has_marker, version_lock_path, DirLock, PackageStore};
use splitpack_core::PackageDescriptor;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Result of a sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepResult {
    pub removed: Vec<PathBuf>,
    pub orphans_removed: Vec<PathBuf>,
    pub failures: usize,
}

impl std::ops::AddAssign for SweepResult {
    fn add_assign(&mut self, other: Self) {
        self.removed.extend(other.removed);
        self.orphans_removed.extend(other.orphans_removed);
        self.failures += other.failures;
    }
}

#[derive(Debug, Clone)]
pub struct VersionRetentionSweeper {
    store: PackageStore,
    retained: usize,
    orphan_max_age: Option<Duration>,
}

impl VersionRetentionSweeper {
    /// Keeps one prior installed version and never reclaims orphans
    pub fn new(store: PackageStore) -> Self {
        Self {
            store,
            retained: 1,
            orphan_max_age: None,
        }
    }

    /// Installed versions to keep besides the current one
    pub fn with_retained_versions(mut self, retained: usize) -> Self {
        self.retained = retained;
        self
    }

    /// Age after which unmarked version directories are deleted; `None` keeps them
    pub fn with_orphan_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.orphan_max_age = max_age;
        self
    }

    /// Sweep one package. Never fails; problems are logged and counted.
    pub fn sweep(&self, name: &str, current_version: Option<&str>) -> SweepResult {
        let mut result = SweepResult::default();

        let dirs = match self.store.version_dirs(name) {
            Ok(dirs) => dirs,
            Err(e) => {
                warn!(package = %name, error = %e, "failed to list package versions");
                result.failures += 1;
                return result;
            }
        };

        let current = current_version.map(|v| self.store.package_root(name).join(v));
        let mut installed = Vec::new();
        let mut unmarked = Vec::new();
        for dir in dirs {
            if current.as_deref() == Some(dir.as_path()) {
                continue;
            }
            if has_marker(&dir) {
                installed.push((modified(&dir), dir));
            } else {
                unmarked.push(dir);
            }
        }

        // newest first; unreadable mtimes sort last
        installed.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, dir) in installed.into_iter().skip(self.retained) {
            match self.remove_unlocked(name, &dir) {
                Some(true) => result.removed.push(dir),
                Some(false) => result.failures += 1,
                None => {}
            }
        }

        if let Some(max_age) = self.orphan_max_age {
            for dir in unmarked {
                match self.reclaim_orphan(name, &dir, max_age) {
                    Some(true) => result.orphans_removed.push(dir),
                    Some(false) => result.failures += 1,
                    None => {}
                }
            }
        }

        result
    }

    pub fn sweep_package(&self, descriptor: &PackageDescriptor) -> SweepResult {
        self.sweep(&descriptor.name, Some(&descriptor.version))
    }

    /// Sweep every declared package, then packages the store holds but the
    /// manifest no longer declares
    pub fn sweep_all(&self, descriptors: &[PackageDescriptor]) -> SweepResult {
        let mut result = SweepResult::default();
        for descriptor in descriptors {
            result += self.sweep_package(descriptor);
        }

        let declared: HashSet<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
        match self.store.package_names() {
            Ok(names) => {
                for name in names.iter().filter(|n| !declared.contains(n.as_str())) {
                    result += self.sweep(name, None);
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to list stored packages");
                result.failures += 1;
            }
        }

        info!(
            removed = result.removed.len(),
            orphans_removed = result.orphans_removed.len(),
            failures = result.failures,
            "retention sweep finished"
        );
        result
    }

    /// `None` when the directory is not reclaimable yet
    fn reclaim_orphan(&self, name: &str, dir: &Path, max_age: Duration) -> Option<bool> {
        let age = modified(dir).and_then(|m| SystemTime::now().duration_since(m).ok())?;
        if age <= max_age {
            return None;
        }

        self.with_lock(name, dir, || {
            // a marker may have landed between listing and locking
            if has_marker(dir) {
                return None;
            }
            Some(self.remove(name, dir))
        })
    }

    /// Delete an installed version unless an install currently holds it
    fn remove_unlocked(&self, name: &str, dir: &Path) -> Option<bool> {
        self.with_lock(name, dir, || Some(self.remove(name, dir)))
    }

    /// Run `f` under the version's install lock; `None` when someone else holds it
    fn with_lock(&self, name: &str, dir: &Path, f: impl FnOnce() -> Option<bool>) -> Option<bool> {
        let _lock = match DirLock::try_acquire(&version_lock_path(dir)) {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                debug!(package = %name, dir = %dir.display(), "version is locked; install in progress");
                return None;
            }
            Err(e) => {
                warn!(package = %name, dir = %dir.display(), error = %e, "failed to lock package version");
                return Some(false);
            }
        };
        f()
    }

    fn remove(&self, name: &str, dir: &Path) -> bool {
        match fs::remove_dir_all(dir) {
            Ok(()) => {
                info!(package = %name, dir = %dir.display(), "removed package version");
                true
            }
            Err(e) => {
                warn!(package = %name, dir = %dir.display(), error = %e, "failed to remove package version");
                false
            }
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{descriptor, mark_installed};
    use std::thread;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> PackageStore {
        PackageStore::new(temp.path().to_path_buf(), "test").unwrap()
    }

    fn install_versions(store: &PackageStore, name: &str, count: u32) -> Vec<PackageDescriptor> {
        (1..=count)
            .map(|v| {
                let d = descriptor(name, &v.to_string());
                mark_installed(store, &d);
                thread::sleep(Duration::from_millis(20));
                d
            })
            .collect()
    }

    #[test]
    fn test_sweep_keeps_current_and_newest_prior() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let versions = install_versions(&store, "feature", 5);

        let result = VersionRetentionSweeper::new(store.clone()).sweep_package(&versions[4]);

        assert_eq!(result.removed.len(), 3);
        assert_eq!(result.failures, 0);
        let mut remaining = store.version_dirs("feature").unwrap();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![store.version_dir(&versions[3]), store.version_dir(&versions[4])]
        );
    }

    #[test]
    fn test_sweep_never_removes_current_even_when_oldest() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let versions = install_versions(&store, "feature", 3);

        VersionRetentionSweeper::new(store.clone()).sweep_package(&versions[0]);

        assert!(store.is_installed(&versions[0]));
        assert!(store.is_installed(&versions[2]));
        assert!(!store.version_dir(&versions[1]).exists());
    }

    #[test]
    fn test_sweep_retained_versions() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let versions = install_versions(&store, "feature", 4);

        let result = VersionRetentionSweeper::new(store.clone())
            .with_retained_versions(0)
            .sweep_package(&versions[3]);

        assert_eq!(result.removed.len(), 3);
        assert_eq!(store.version_dirs("feature").unwrap().len(), 1);
    }

    #[test]
    fn test_unmarked_directories_kept_without_orphan_policy() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let current = descriptor("feature", "2");
        mark_installed(&store, &current);
        let partial = store.ensure_version_dir(&descriptor("feature", "1")).unwrap();

        let result = VersionRetentionSweeper::new(store.clone()).sweep_package(&current);

        assert_eq!(result, SweepResult::default());
        assert!(partial.exists());
    }

    #[test]
    fn test_old_orphan_is_reclaimed() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let current = descriptor("feature", "2");
        mark_installed(&store, &current);
        let orphan = store.ensure_version_dir(&descriptor("feature", "1")).unwrap();
        thread::sleep(Duration::from_millis(20));

        let sweeper =
            VersionRetentionSweeper::new(store.clone()).with_orphan_max_age(Some(Duration::ZERO));
        let result = sweeper.sweep_package(&current);

        assert_eq!(result.orphans_removed, vec![orphan.clone()]);
        assert!(!orphan.exists());
    }

    #[test]
    fn test_young_orphan_is_kept() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let current = descriptor("feature", "2");
        let orphan = store.ensure_version_dir(&descriptor("feature", "1")).unwrap();

        let sweeper = VersionRetentionSweeper::new(store.clone())
            .with_orphan_max_age(Some(Duration::from_secs(3600)));
        let result = sweeper.sweep_package(&current);

        assert!(result.orphans_removed.is_empty());
        assert!(orphan.exists());
    }

    #[test]
    fn test_locked_orphan_is_kept() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let current = descriptor("feature", "2");
        let in_progress = descriptor("feature", "1");
        store.ensure_version_dir(&in_progress).unwrap();
        let _lock = DirLock::acquire(&store.lock_path(&in_progress)).unwrap();
        thread::sleep(Duration::from_millis(20));

        let sweeper =
            VersionRetentionSweeper::new(store.clone()).with_orphan_max_age(Some(Duration::ZERO));
        let result = sweeper.sweep_package(&current);

        assert!(result.orphans_removed.is_empty());
        assert!(store.version_dir(&in_progress).exists());
    }

    #[test]
    fn test_locked_installed_version_is_kept() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let versions = install_versions(&store, "feature", 3);
        let _lock = DirLock::acquire(&store.lock_path(&versions[0])).unwrap();

        let result = VersionRetentionSweeper::new(store.clone()).sweep_package(&versions[2]);

        assert!(result.removed.is_empty());
        assert_eq!(result.failures, 0);
        assert!(store.is_installed(&versions[0]));
        assert!(store.is_installed(&versions[1]));
    }

    #[test]
    fn test_sweep_all_covers_undeclared_packages() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        install_versions(&store, "retired", 3);
        let declared = install_versions(&store, "feature", 3);

        let result = VersionRetentionSweeper::new(store.clone()).sweep_all(&declared[2..]);

        assert_eq!(result.removed.len(), 3);
        assert_eq!(store.version_dirs("feature").unwrap().len(), 2);
        assert_eq!(store.version_dirs("retired").unwrap().len(), 1);
    }

    #[test]
    fn test_sweep_missing_package_is_empty() {
        let temp = TempDir::new().unwrap();
        let result = VersionRetentionSweeper::new(store(&temp)).sweep("absent", None);
        assert_eq!(result, SweepResult::default());
    }
}
