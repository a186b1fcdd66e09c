use crate::core::path::{config_file, default_store_base, ensure_dir, validate_component};
use crate::core::{SplitError, SplitResult};
use crate::di::ConfigProvider;
use crate::package::checksum::ChecksumAlgorithm;
use crate::runtime::RuntimeProfile;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base directory for store roots (defaults to the platform data directory)
    ///
    /// Default locations:
    /// - Windows: %LOCALAPPDATA%\splitpack\store
    /// - Linux: ~/.local/share/splitpack/store
    /// - macOS: ~/Library/Application Support/splitpack/store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<String>,

    /// Store id used when the manifest does not carry one
    #[serde(default = "default_store_id")]
    pub store_id: String,

    /// Application id; process rules like ":worker" are completed with it
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Whether to verify package signatures on install
    #[serde(default)]
    pub verify_signature: bool,

    /// Signer fingerprint packages must carry when signatures are verified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trusted_signer: Option<String>,

    /// Checksum algorithm used by `splitpack hash`
    /// - "blake3": BLAKE3 (default, faster and more secure)
    /// - "sha256": SHA-256
    #[serde(default = "default_checksum_algorithm")]
    pub checksum_algorithm: String,

    /// Installed versions kept besides the current one
    #[serde(default = "default_retained_versions")]
    pub retained_versions: usize,

    /// Age after which never-installed version directories are reclaimed
    #[serde(default = "default_orphan_max_age_days")]
    pub orphan_max_age_days: u64,

    /// Whether the runtime loads every code segment of a package itself
    #[serde(default = "default_true")]
    pub multi_segment_capable: bool,

    /// Native architectures in preference order (defaults to the host arch)
    #[serde(default = "default_supported_archs")]
    pub supported_archs: Vec<String>,

    /// Host platform level compared against each package's `minPlatform`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_level: Option<u32>,

    /// Accept installs whose generated code is missing or corrupt
    #[serde(default = "default_true")]
    pub allow_fallback_mode: bool,

    /// Validate generated code after extraction
    #[serde(default)]
    pub check_generated_code: bool,

    /// Directory of packages shipped with the host, used to restore built-in packages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_dir: Option<String>,
}

fn default_store_id() -> String {
    "default".to_string()
}

fn default_app_id() -> String {
    "app".to_string()
}

fn default_checksum_algorithm() -> String {
    "blake3".to_string()
}

fn default_retained_versions() -> usize {
    1
}

fn default_orphan_max_age_days() -> u64 {
    7
}

fn default_supported_archs() -> Vec<String> {
    vec![std::env::consts::ARCH.to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: None,
            store_id: default_store_id(),
            app_id: default_app_id(),
            verify_signature: false,
            trusted_signer: None,
            checksum_algorithm: default_checksum_algorithm(),
            retained_versions: default_retained_versions(),
            orphan_max_age_days: default_orphan_max_age_days(),
            multi_segment_capable: true,
            supported_archs: default_supported_archs(),
            platform_level: None,
            allow_fallback_mode: true,
            check_generated_code: false,
            bundle_dir: None,
        }
    }
}

impl Config {
    /// Load config from platform-specific config directory, creating default if it doesn't exist
    ///
    /// Config locations:
    /// - Windows: %APPDATA%\splitpack\config.yaml
    /// - Linux: ~/.config/splitpack/config.yaml
    /// - macOS: ~/Library/Application Support/splitpack/config.yaml
    pub fn load() -> SplitResult<Self> {
        let config_path = config_file()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load config from an explicit file; the file must exist
    pub fn load_from(path: &Path) -> SplitResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SplitError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| SplitError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to platform-specific config directory
    pub fn save(&self) -> SplitResult<()> {
        self.save_to(&config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> SplitResult<()> {
        let config_dir = path
            .parent()
            .ok_or_else(|| SplitError::Path("Invalid config path".to_string()))?;
        ensure_dir(config_dir)?;

        let content = serde_yaml::to_string(self)
            .map_err(|e| SplitError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> SplitResult<()> {
        ChecksumAlgorithm::from_name(&self.checksum_algorithm)?;
        if self.app_id.trim().is_empty() {
            return Err(SplitError::Config("app_id must not be empty".to_string()));
        }
        // names the application's directory under the store base
        validate_component("app_id", &self.app_id)?;
        Ok(())
    }

    /// Get the store base directory path
    pub fn get_store_base(&self) -> SplitResult<PathBuf> {
        match self.store_dir {
            Some(ref dir) => Ok(PathBuf::from(dir)),
            None => default_store_base(),
        }
    }

    pub fn get_runtime_profile(&self) -> RuntimeProfile {
        RuntimeProfile {
            multi_segment_capable: self.multi_segment_capable,
            supported_archs: self.supported_archs.clone(),
            platform_level: self.platform_level,
            allow_fallback_mode: self.allow_fallback_mode,
        }
    }
}

// Implement ConfigProvider trait
impl ConfigProvider for Config {
    fn store_base(&self) -> SplitResult<PathBuf> {
        self.get_store_base()
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
        Duration::from_secs(self.orphan_max_age_days * 24 * 60 * 60)
    }

    fn runtime_profile(&self) -> RuntimeProfile {
        self.get_runtime_profile()
    }

    fn bundle_dir(&self) -> Option<PathBuf> {
        self.bundle_dir.as_ref().map(PathBuf::from)
    }

    fn check_generated_code(&self) -> bool {
        self.check_generated_code
    }
}
