//! Record of what has already been extracted into a target directory.
//!
//! The record is rewritten after every extracted entry, so an interrupted
//! extraction resumes where it stopped instead of starting over.

use crate::core::SplitResult;
use crate::store::write_atomic;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const MANIFEST_FILE: &str = ".extracted.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedEntry {
    pub name: String,
    pub checksum: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionManifest {
    /// Identifies the package build the entries were extracted from
    pub key: String,
    #[serde(default)]
    pub entries: Vec<ExtractedEntry>,
}

impl ExtractionManifest {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// Load the record for `dir`; a missing or unreadable one is empty
    pub fn load(dir: &Path) -> Self {
        let path = Self::path(dir);
        let Ok(content) = fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(manifest = %path.display(), error = %e, "ignoring corrupt extraction record");
                Self::default()
            }
        }
    }

    /// Load the record for `dir`, discarding it when it belongs to another build
    pub fn load_for(dir: &Path, key: &str) -> Self {
        let manifest = Self::load(dir);
        if manifest.key == key {
            manifest
        } else {
            Self::new(key)
        }
    }

    pub fn save(&self, dir: &Path) -> SplitResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(&Self::path(dir), &json)?;
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&ExtractedEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn record(&mut self, name: &str, checksum: &str, size: u64) {
        let entry = ExtractedEntry {
            name: name.to_string(),
            checksum: checksum.to_string(),
            size,
        };
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Whether `name` was extracted with `checksum` and is still on disk at full size
    pub fn is_current(&self, dir: &Path, name: &str, checksum: &str) -> bool {
        let Some(entry) = self.lookup(name) else {
            return false;
        };
        entry.checksum == checksum
            && fs::metadata(dir.join(name))
                .map(|m| m.is_file() && m.len() == entry.size)
                .unwrap_or(false)
    }

    /// Extracted files that are still present, in extraction order
    pub fn existing_files(&self, dir: &Path) -> Vec<PathBuf> {
        self.entries
            .iter()
            .map(|e| dir.join(&e.name))
            .filter(|p| p.is_file())
            .collect()
    }
}
