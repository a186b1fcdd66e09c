//! Forgetting installed packages.
//!
//! Uninstall only deletes installed markers. The version directories stay
//! until the retention sweeper reclaims them as orphans.

use crate::core::{SplitError, SplitResult};
use crate::store::{write_atomic, PackageStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

const PENDING_FILE: &str = "pending.yaml";

/// Uninstall requests waiting for the next start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUninstall {
    pub requested_at: DateTime<Utc>,
    pub packages: Vec<String>,
}

pub struct Uninstaller {
    store: PackageStore,
}

impl Uninstaller {
    pub fn new(store: PackageStore) -> Self {
        Self { store }
    }

    pub fn pending_path(&self) -> PathBuf {
        self.store.uninstall_dir().join(PENDING_FILE)
    }

    /// Remove the installed markers of `names` now.
    ///
    /// Returns the names that actually had a marker.
    pub fn uninstall(&self, names: &[String]) -> SplitResult<Vec<String>> {
        let mut forgotten = Vec::new();
        for name in names {
            let removed = self.store.remove_markers(name)?;
            if removed > 0 {
                info!(package = %name, markers = removed, "uninstalled package");
                forgotten.push(name.clone());
            } else {
                debug!(package = %name, "package was not installed");
            }
        }
        Ok(forgotten)
    }

    /// Record `names` for removal on the next call to [`process_pending`](Self::process_pending)
    pub fn schedule(&self, names: &[String]) -> SplitResult<PendingUninstall> {
        let mut pending = self.pending()?.unwrap_or_else(|| PendingUninstall {
            requested_at: Utc::now(),
            packages: Vec::new(),
        });
        for name in names {
            if !pending.packages.contains(name) {
                pending.packages.push(name.clone());
            }
        }
        pending.requested_at = Utc::now();

        let content = serde_yaml::to_string(&pending)?;
        write_atomic(&self.pending_path(), content.as_bytes())?;
        info!(packages = ?pending.packages, "scheduled uninstall");
        Ok(pending)
    }

    pub fn pending(&self) -> SplitResult<Option<PendingUninstall>> {
        let path = self.pending_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let pending = serde_yaml::from_str(&content).map_err(|e| {
            SplitError::Package(format!(
                "Failed to parse pending uninstall list {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Some(pending))
    }

    /// Apply and clear scheduled uninstalls
    pub fn process_pending(&self) -> SplitResult<Vec<String>> {
        let Some(pending) = self.pending()? else {
            return Ok(Vec::new());
        };

        let forgotten = self.uninstall(&pending.packages)?;
        fs::remove_file(self.pending_path())?;
        Ok(forgotten)
    }
}
