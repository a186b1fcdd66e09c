//! Split package descriptors and the manifest that lists them.
//!
//! A descriptor is immutable once parsed and is identified by
//! `(name, version)`. The manifest preserves declaration order, which the
//! activation planner uses to break ties.

use crate::core::path::validate_component;
use crate::core::{SplitError, SplitResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Architecture tag of the artifact that carries the package's code and resources.
pub const MASTER_ARCH: &str = "master";

/// Source locator prefix for artifacts shipped inside the host bundle.
pub const BUNDLE_SCHEME: &str = "bundle://";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    /// `master` or a native architecture tag such as `arm64`
    pub arch: String,
    /// Where the download collaborator fetches the bytes from
    pub source: String,
    /// Prefixed content hash (`blake3:<hex>` or `sha256:<hex>`)
    pub hash: String,
    pub size: u64,
}

impl ArtifactDescriptor {
    pub fn is_master(&self) -> bool {
        self.arch == MASTER_ARCH
    }

    pub fn is_bundled(&self) -> bool {
        self.source.starts_with(BUNDLE_SCHEME)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LibDescriptor {
    pub name: String,
    pub hash: String,
    pub size: u64,
}

/// Native libraries a package provides for one architecture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LibSet {
    pub arch: String,
    #[serde(default)]
    pub libs: Vec<LibDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    pub name: String,

    /// Version of the owning application; filled from the manifest when omitted
    #[serde(default)]
    pub app_version: String,

    pub version: String,

    #[serde(default)]
    pub built_in: bool,

    /// Minimum host platform level required to load this package
    #[serde(default)]
    pub min_platform: u32,

    /// Number of code segments; zero for resource-only packages
    #[serde(default)]
    pub segments: u32,

    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Processes the package may be loaded in (empty: everywhere)
    #[serde(default)]
    pub processes: Vec<String>,

    /// Processes the package must never be loaded in
    #[serde(default)]
    pub forbidden_processes: Vec<String>,

    pub artifacts: Vec<ArtifactDescriptor>,

    #[serde(default)]
    pub libs: Vec<LibSet>,
}

impl PackageDescriptor {
    pub fn master_artifact(&self) -> Option<&ArtifactDescriptor> {
        self.artifacts.iter().find(|a| a.is_master())
    }

    pub fn artifact_for(&self, arch: &str) -> Option<&ArtifactDescriptor> {
        self.artifacts.iter().find(|a| a.arch == arch)
    }

    pub fn libs_for(&self, arch: &str) -> Option<&LibSet> {
        self.libs.iter().find(|set| set.arch == arch)
    }

    /// Pick the native library set for the first supported architecture the
    /// package provides.
    pub fn select_libs(&self, supported_archs: &[String]) -> Option<&LibSet> {
        supported_archs
            .iter()
            .find_map(|arch| self.libs_for(arch))
            .filter(|set| !set.libs.is_empty())
    }

    pub fn has_code(&self) -> bool {
        self.segments > 0
    }

    pub fn validate(&self) -> SplitResult<()> {
        validate_component("package name", &self.name)?;
        validate_component("package version", &self.version)?;

        if self.master_artifact().is_none() {
            return Err(SplitError::Package(format!(
                "Package '{}' has no '{}' artifact",
                self.name, MASTER_ARCH
            )));
        }

        let mut arches = HashSet::new();
        for artifact in &self.artifacts {
            validate_component("artifact arch", &artifact.arch)?;
            if !arches.insert(artifact.arch.as_str()) {
                return Err(SplitError::Package(format!(
                    "Package '{}' declares arch '{}' twice",
                    self.name, artifact.arch
                )));
            }
        }

        for set in &self.libs {
            validate_component("library arch", &set.arch)?;
            for lib in &set.libs {
                validate_component("library name", &lib.name)?;
            }
        }

        if self.dependencies.iter().any(|dep| dep == &self.name) {
            return Err(SplitError::Package(format!(
                "Package '{}' depends on itself",
                self.name
            )));
        }

        Ok(())
    }
}

/// The list of split packages known to the host application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SplitManifest {
    /// Application + configuration identity the store root is keyed by;
    /// empty means the configured default
    #[serde(default)]
    pub store_id: String,

    pub app_version: String,

    #[serde(default)]
    pub splits: Vec<PackageDescriptor>,
}

impl SplitManifest {
    /// Load a manifest from a YAML file
    pub fn load(path: &Path) -> SplitResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SplitError::Package(format!(
                "Failed to read manifest {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> SplitResult<Self> {
        let mut manifest: SplitManifest = serde_yaml::from_str(content)?;
        manifest.normalize()?;
        Ok(manifest)
    }

    fn normalize(&mut self) -> SplitResult<()> {
        if !self.store_id.is_empty() {
            validate_component("store id", &self.store_id)?;
        }

        let mut names = HashSet::new();
        for split in &mut self.splits {
            if split.app_version.is_empty() {
                split.app_version = self.app_version.clone();
            }
            split.validate()?;
            if !names.insert(split.name.clone()) {
                return Err(SplitError::Package(format!(
                    "Package '{}' is declared twice",
                    split.name
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PackageDescriptor> {
        self.splits.iter().find(|s| s.name == name)
    }

    /// Select packages by name, keeping manifest declaration order.
    ///
    /// An empty `names` selects every package.
    pub fn select(&self, names: &[String]) -> SplitResult<Vec<PackageDescriptor>> {
        if let Some(unknown) = names.iter().find(|n| self.get(n).is_none()) {
            return Err(SplitError::Package(format!(
                "Package '{}' is not declared in the manifest",
                unknown
            )));
        }
        Ok(self
            .splits
            .iter()
            .filter(|s| names.is_empty() || names.contains(&s.name))
            .cloned()
            .collect())
    }
}
