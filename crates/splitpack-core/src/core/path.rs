use crate::core::{SplitError, SplitResult};
use std::path::{Path, PathBuf};

/// Get the Splitpack home directory
///
/// Platform-specific locations:
/// - Windows: %APPDATA%\splitpack
/// - Linux: ~/.config/splitpack
/// - macOS: ~/Library/Application Support/splitpack
pub fn splitpack_home() -> SplitResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("splitpack"))
        .ok_or_else(|| SplitError::Path("Could not determine config directory".to_string()))
}

/// Get the config file path
pub fn config_file() -> SplitResult<PathBuf> {
    Ok(splitpack_home()?.join("config.yaml"))
}

/// Get the default base directory under which store roots live
///
/// Platform-specific locations:
/// - Windows: %LOCALAPPDATA%\splitpack\store
/// - Linux: ~/.local/share/splitpack/store
/// - macOS: ~/Library/Application Support/splitpack/store
pub fn default_store_base() -> SplitResult<PathBuf> {
    dirs::data_local_dir()
        .map(|dir| dir.join("splitpack").join("store"))
        .ok_or_else(|| SplitError::Path("Could not determine data directory".to_string()))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> SplitResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Reject names that would escape their directory when used as a path component
pub fn validate_component(kind: &str, value: &str) -> SplitResult<()> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\')
        || value.starts_with('.');
    if bad {
        return Err(SplitError::Path(format!(
            "Invalid {} '{}': must be a plain file name",
            kind, value
        )));
    }
    Ok(())
}
